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

use std::{
    borrow::Cow,
    fmt::{Debug, Formatter},
    ops::{Deref, DerefMut},
    ptr::NonNull,
};

use crate::runtime::{
    ty::{has_user_pointer, user_pointer},
    FromObject,
    IntoStack,
    ObjectView,
    RuntimeResult,
    Stack,
    UserType,
};

/// A pointer to a foreign object of the user type `T`.
///
/// Pulling a UserPtr accepts foreign objects of `T` and of the types that
/// declare `T` as their base; in the latter case the pointer is upcasted
/// through the declared base chain. Pushing a UserPtr creates a foreign
/// object that refers to the pointee without owning it.
///
/// The UserPtr does not keep the object alive. Dereferencing it is only
/// sound while the object's finalizer has not run, for example, while the
/// slot the pointer was pulled from remains on the stack.
pub struct UserPtr<T: UserType> {
    ptr: NonNull<T>,
}

impl<T: UserType> Clone for UserPtr<T> {
    #[inline(always)]
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: UserType> Copy for UserPtr<T> {}

impl<T: UserType> Debug for UserPtr<T> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!("UserPtr<{}>({:p})", T::type_name(), self.ptr))
    }
}

impl<T: UserType> PartialEq for UserPtr<T> {
    #[inline(always)]
    fn eq(&self, other: &Self) -> bool {
        self.ptr == other.ptr
    }
}

impl<T: UserType> Eq for UserPtr<T> {}

impl<T: UserType> IntoStack for UserPtr<T> {
    #[inline(always)]
    fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
        // Safety: Upheld by the creator of the pointer.
        let _ = unsafe { stack.push_raw_pointer(self.ptr) }?;

        Ok(())
    }
}

impl<'s, T: UserType> FromObject<'s> for UserPtr<T> {
    const RETAINS_SLOT: bool = true;

    #[inline(always)]
    fn hint() -> Cow<'static, str> {
        Cow::Borrowed(T::type_name())
    }

    #[inline(always)]
    fn probe(object: &ObjectView<'s>) -> bool {
        has_user_pointer::<T>(object)
    }

    #[inline(always)]
    fn from_object(object: ObjectView<'s>) -> RuntimeResult<Self> {
        Ok(Self {
            ptr: user_pointer::<T>(&object)?,
        })
    }
}

impl<T: UserType> UserPtr<T> {
    /// Creates a UserPtr from a raw pointer.
    ///
    /// # Safety
    ///
    /// The pointee must outlive every use of the pointer, including the uses
    /// by Lua code after the pointer is pushed.
    #[inline(always)]
    pub unsafe fn new_unchecked(ptr: NonNull<T>) -> Self {
        Self { ptr }
    }

    /// Returns the raw pointer.
    #[inline(always)]
    pub fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    /// Returns the address of the pointee.
    #[inline(always)]
    pub fn address(&self) -> usize {
        self.ptr.as_ptr() as usize
    }

    /// Returns a shared reference to the pointee.
    ///
    /// # Safety
    ///
    /// The pointee must be alive and must not be mutably borrowed for the
    /// lifetime of the reference.
    #[inline(always)]
    pub unsafe fn as_ref<'a>(&self) -> &'a T {
        self.ptr.as_ref()
    }

    /// Returns a mutable reference to the pointee.
    ///
    /// # Safety
    ///
    /// The pointee must be alive and must not be borrowed elsewhere for the
    /// lifetime of the reference.
    #[inline(always)]
    pub unsafe fn as_mut<'a>(&mut self) -> &'a mut T {
        self.ptr.as_mut()
    }
}

/// A wrapper that pushes a [UserType] by value and pulls a copy of a
/// foreign object.
///
/// ```
/// use ad_astra_lua::{runtime::{State, UserType}, UserValue};
///
/// #[derive(Clone, Debug, PartialEq)]
/// struct Color(u8, u8, u8);
///
/// impl UserType for Color {}
///
/// let state = State::new().unwrap();
///
/// state.with_stack(|stack| {
///     let color = stack.push(UserValue(Color(1, 2, 3))).unwrap();
///
///     assert_eq!(color.get::<UserValue<Color>>().unwrap().0, Color(1, 2, 3));
/// });
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct UserValue<T>(pub T);

impl<T> Deref for UserValue<T> {
    type Target = T;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> DerefMut for UserValue<T> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl<T: UserType> IntoStack for UserValue<T> {
    #[inline(always)]
    fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
        let _ = stack.push_value(self.0)?;

        Ok(())
    }
}

impl<'s, T: UserType + Clone> FromObject<'s> for UserValue<T> {
    #[inline(always)]
    fn hint() -> Cow<'static, str> {
        Cow::Borrowed(T::type_name())
    }

    #[inline(always)]
    fn probe(object: &ObjectView<'s>) -> bool {
        has_user_pointer::<T>(object)
    }

    #[inline(always)]
    fn from_object(object: ObjectView<'s>) -> RuntimeResult<Self> {
        object.with_user::<T, _>(|value| Self(value.clone()))
    }
}
