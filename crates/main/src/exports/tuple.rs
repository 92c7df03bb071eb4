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

use crate::runtime::{PullMulti, PushMulti, RuntimeResult, Stack};

macro_rules! impl_tuple {
    ($($name:ident),+) => {
        impl<$($name: PushMulti),+> PushMulti for ($($name,)+) {
            #[allow(non_snake_case)]
            fn push_multi(self, stack: &Stack) -> RuntimeResult<i32> {
                let ($($name,)+) = self;
                let mut count = 0;

                $(
                count += $name.push_multi(stack)?;
                )+

                Ok(count)
            }
        }

        impl<'s, $($name: PullMulti<'s>),+> PullMulti<'s> for ($($name,)+) {
            fn result_count() -> Option<i32> {
                let mut count = 0;

                $(
                count += $name::result_count()?;
                )+

                Some(count)
            }

            fn probe_multi(stack: &'s Stack, position: &mut i32) -> bool {
                $(
                if !$name::probe_multi(stack, position) {
                    return false;
                }
                )+

                true
            }

            fn pull_multi(stack: &'s Stack, position: &mut i32) -> RuntimeResult<Self> {
                Ok(($($name::pull_multi(stack, position)?,)+))
            }
        }
    };
}

impl_tuple!(A);
impl_tuple!(A, B);
impl_tuple!(A, B, C);
impl_tuple!(A, B, C, D);
impl_tuple!(A, B, C, D, E);
impl_tuple!(A, B, C, D, E, F);
impl_tuple!(A, B, C, D, E, F, G);
