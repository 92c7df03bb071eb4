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

use std::borrow::Cow;

use crate::runtime::{ObjectView, RuntimeError, RuntimeResult, Stack, ValueKind};

/// A trait that pushes Rust data onto the Lua stack as exactly one value.
///
/// The crate implements this trait for booleans, numbers, strings,
/// [Nil](crate::Nil), [Option], [Either](crate::Either), stack views,
/// persistent references, and foreign objects. The
/// [UserType](crate::UserType) and [ScriptEnum](crate::ScriptEnum) derive
/// macros implement it for user types and enums.
///
/// ```
/// use ad_astra_lua::runtime::State;
///
/// let state = State::new().unwrap();
///
/// state.with_stack(|stack| {
///     let value = stack.push(Some("hello")).unwrap();
///
///     assert!(value.is_string());
/// });
/// ```
///
/// An implementation must push exactly one slot. [Stack::push] verifies this
/// and rejects conversions that push a different number of slots with the
/// [MultipleValues](RuntimeError::MultipleValues) error.
pub trait IntoStack {
    /// Pushes `self` on top of the `stack`.
    ///
    /// If the function fails, it may leave partially pushed slots, the
    /// caller restores the stack height.
    fn push_into(self, stack: &Stack) -> RuntimeResult<()>;
}

/// A trait that converts one stack slot into Rust data.
///
/// The opposite operation is provided through the [IntoStack] trait.
pub trait FromObject<'s>: Sized {
    /// If true, the conversion borrows the slot (e.g. a view of it), and
    /// the slot must stay on the stack. Otherwise, the slot is removed once
    /// it is converted.
    const RETAINS_SLOT: bool = false;

    /// A name of the expected shape used in error messages.
    fn hint() -> Cow<'static, str>;

    /// Returns true if the `object` can be converted into this type.
    ///
    /// The probe never fails and never changes the stack.
    fn probe(object: &ObjectView<'s>) -> bool;

    /// Converts the `object` into this type.
    fn from_object(object: ObjectView<'s>) -> RuntimeResult<Self>;

    /// The value used when the slot does not exist (e.g. a missing trailing
    /// argument). By default, a missing value is a type mismatch.
    #[inline(always)]
    fn from_nothing() -> Option<Self> {
        None
    }
}

/// A trait that pushes Rust data onto the Lua stack as any number of values.
///
/// Every [IntoStack] type pushes one value. Tuples push their elements in
/// order, `()` pushes nothing, and [Variadic](crate::Variadic) pushes all of
/// its items.
pub trait PushMulti {
    /// Pushes `self` on top of the `stack` and returns the number of pushed
    /// slots.
    fn push_multi(self, stack: &Stack) -> RuntimeResult<i32>;
}

/// A trait that converts a sequence of stack slots into Rust data.
///
/// The conversion starts at a cursor `position` (an absolute index of the
/// frame). Slots converted into owned data are removed, and the slots above
/// them shift down. Slots retained by views are kept, and the cursor moves
/// past them.
pub trait PullMulti<'s>: Sized {
    /// The number of values this type expects from a function call, or
    /// [None] if it accepts any number of values.
    fn result_count() -> Option<i32>;

    /// Tests whether the slots starting at `position` can be converted into
    /// this type. The cursor moves past the tested slots.
    fn probe_multi(stack: &'s Stack, position: &mut i32) -> bool;

    /// Converts the slots starting at `position` into this type.
    fn pull_multi(stack: &'s Stack, position: &mut i32) -> RuntimeResult<Self>;
}

impl<T: IntoStack> PushMulti for T {
    #[inline(always)]
    fn push_multi(self, stack: &Stack) -> RuntimeResult<i32> {
        self.push_into(stack)?;

        Ok(1)
    }
}

impl<'s, T: FromObject<'s>> PullMulti<'s> for T {
    #[inline(always)]
    fn result_count() -> Option<i32> {
        Some(1)
    }

    fn probe_multi(stack: &'s Stack, position: &mut i32) -> bool {
        let current = *position;

        *position += 1;

        if current > stack.top() {
            return T::from_nothing().is_some();
        }

        T::probe(&ObjectView::new(stack, current))
    }

    fn pull_multi(stack: &'s Stack, position: &mut i32) -> RuntimeResult<Self> {
        if *position > stack.top() {
            return match T::from_nothing() {
                Some(value) => Ok(value),

                None => Err(RuntimeError::TypeMismatch {
                    expected: T::hint(),
                    found: ValueKind::None,
                }),
            };
        }

        let value = T::from_object(ObjectView::new(stack, *position))?;

        match T::RETAINS_SLOT {
            true => *position += 1,
            false => stack.remove(*position)?,
        }

        Ok(value)
    }
}

// Builds the mismatch error of a failed conversion.
#[inline(always)]
pub(crate) fn mismatch<'s, T: FromObject<'s>>(object: &ObjectView<'s>) -> RuntimeError {
    RuntimeError::TypeMismatch {
        expected: T::hint(),
        found: object.kind(),
    }
}
