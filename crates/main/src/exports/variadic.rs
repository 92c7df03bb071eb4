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

use std::ops::{Deref, DerefMut};

use crate::runtime::{ObjectView, PullMulti, PushMulti, RuntimeResult, Stack};

/// All values from the cursor position up to the top of the frame.
///
/// Pulled from the frame of a raw host function, or as the result of a call,
/// `Variadic` collects the remaining values. As a result of a host function,
/// it pushes every item. The collected slots stay on the stack.
#[derive(Clone, Debug, Default)]
pub struct Variadic<'s>(pub Vec<ObjectView<'s>>);

impl<'s> Deref for Variadic<'s> {
    type Target = Vec<ObjectView<'s>>;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'s> DerefMut for Variadic<'s> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<'s> FromIterator<ObjectView<'s>> for Variadic<'s> {
    #[inline(always)]
    fn from_iter<I: IntoIterator<Item = ObjectView<'s>>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'s> PushMulti for Variadic<'s> {
    fn push_multi(self, stack: &Stack) -> RuntimeResult<i32> {
        let count = i32::try_from(self.0.len()).unwrap_or(i32::MAX);

        stack.ensure(self.0.len())?;

        for object in self.0 {
            let _ = object.push_to(stack)?;
        }

        Ok(count)
    }
}

impl<'s> PullMulti<'s> for Variadic<'s> {
    #[inline(always)]
    fn result_count() -> Option<i32> {
        None
    }

    #[inline(always)]
    fn probe_multi(stack: &'s Stack, position: &mut i32) -> bool {
        *position = (*position).max(stack.top() + 1);

        true
    }

    fn pull_multi(stack: &'s Stack, position: &mut i32) -> RuntimeResult<Self> {
        let top = stack.top();
        let mut items = Vec::with_capacity((top + 1 - *position).max(0) as usize);

        while *position <= top {
            items.push(stack.object(*position)?);
            *position += 1;
        }

        Ok(Self(items))
    }
}
