////////////////////////////////////////////////////////////////////////////////
// This file is part of "Ad Astra", an embeddable scripting programming       //
// language platform.                                                         //
//                                                                            //
// This work is proprietary software with source-available code.              //
//                                                                            //
// To copy, use, distribute, or contribute to this work, you must agree to    //
// the terms of the General License Agreement:                                //
//                                                                            //
// https://github.com/Eliah-Lakhin/ad-astra/blob/master/EULA.md               //
//                                                                            //
// The agreement grants a Basic Commercial License, allowing you to use       //
// this work in non-commercial and limited commercial products with a total   //
// gross revenue cap. To remove this commercial limit for one of your         //
// products, you must acquire a Full Commercial License.                      //
//                                                                            //
// If you contribute to the source code, documentation, or related materials, //
// you must grant me an exclusive license to these contributions.             //
// Contributions are governed by the "Contributions" section of the General   //
// License Agreement.                                                         //
//                                                                            //
// Copying the work in parts is strictly forbidden, except as permitted       //
// under the General License Agreement.                                       //
//                                                                            //
// If you do not or cannot agree to the terms of this Agreement,              //
// do not use this work.                                                      //
//                                                                            //
// This work is provided "as is", without any warranties, express or implied, //
// except where such disclaimers are legally invalid.                         //
//                                                                            //
// Copyright (c) 2024 Ilya Lakhin (Илья Александрович Лахин).                 //
// All rights reserved.                                                       //
////////////////////////////////////////////////////////////////////////////////

use std::{any::Any, error::Error as StdError, result::Result as StdResult};

use crate::runtime::{PushMulti, RuntimeError, RuntimeResult, Stack};

// An Err result of a host function is raised as a Lua error.
impl<T, E> PushMulti for StdResult<T, E>
where
    T: PushMulti,
    E: StdError + 'static,
{
    #[inline]
    fn push_multi(self, stack: &Stack) -> RuntimeResult<i32> {
        match self {
            Ok(inner) => inner.push_multi(stack),
            Err(error) => Err(into_runtime_error(error)),
        }
    }
}

fn into_runtime_error<E: StdError + 'static>(error: E) -> RuntimeError {
    let any: &dyn Any = &error;

    match any.downcast_ref::<RuntimeError>() {
        Some(error) => error.clone(),

        None => RuntimeError::ForeignCall {
            message: error.to_string(),
        },
    }
}
