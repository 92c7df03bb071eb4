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
    ffi::c_int,
    fmt::{Debug, Formatter},
    ops::Deref,
    ptr::NonNull,
    rc::{Rc, Weak},
};

use log::{trace, warn};
use mlua_sys as ffi;

use crate::{
    report::REFERENCE_LOG,
    runtime::{
        state::Engine,
        FunctionView,
        ObjectView,
        PullMulti,
        PushMulti,
        RuntimeError,
        RuntimeResult,
        Stack,
        StackGuard,
        TableView,
        ValueKind,
    },
};

/// A persistent handle to a Lua value.
///
/// The referenced value stays alive independently of the stack frames
/// until the Reference is [released](Self::release) or dropped. The
/// Reference can be resolved on any frame of the engine it was created in,
/// including the frames of other coroutines.
///
/// ```
/// use ad_astra_lua::runtime::State;
///
/// let state = State::new().unwrap();
///
/// let reference = state.with_stack(|stack| {
///     stack.push("persistent").unwrap().store().unwrap()
/// });
///
/// state.with_stack(|stack| {
///     let value = reference.push_to(stack).unwrap();
///
///     assert_eq!(value.get::<String>().unwrap(), "persistent");
/// });
/// ```
///
/// The default Reference is invalid: it does not point to any value, and
/// resolving it fails with [InvalidReference](RuntimeError::InvalidReference).
/// References to `nil` do not occupy a slot of the engine.
pub struct Reference {
    engine: Weak<Engine>,
    key: c_int,
}

impl Default for Reference {
    #[inline(always)]
    fn default() -> Self {
        Self {
            engine: Weak::new(),
            key: ffi::LUA_NOREF,
        }
    }
}

impl Debug for Reference {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self.key {
            ffi::LUA_NOREF => formatter.write_str("Reference(invalid)"),
            ffi::LUA_REFNIL => formatter.write_str("Reference(nil)"),
            key => formatter.write_fmt(format_args!("Reference({key})")),
        }
    }
}

impl PartialEq for Reference {
    fn eq(&self, other: &Self) -> bool {
        match (self.key, other.key) {
            (ffi::LUA_NOREF, ffi::LUA_NOREF) => true,
            (ffi::LUA_REFNIL, ffi::LUA_REFNIL) => true,
            (this, other_key) => this == other_key && self.engine.ptr_eq(&other.engine),
        }
    }
}

impl Eq for Reference {}

impl Clone for Reference {
    fn clone(&self) -> Self {
        let Some(engine) = self.live_engine() else {
            return Self {
                engine: Weak::new(),
                key: self.key,
            };
        };

        if self.key == ffi::LUA_REFNIL {
            return Self {
                engine: self.engine.clone(),
                key: ffi::LUA_REFNIL,
            };
        }

        let state = engine.main().as_ptr();

        // Safety: The main thread is alive while the engine is alive.
        let key = unsafe {
            match ffi::lua_checkstack(state, 2) != 0 {
                true => {
                    let _ = ffi::lua_rawgeti(state, ffi::LUA_REGISTRYINDEX, self.key as _);

                    ffi::luaL_ref(state, ffi::LUA_REGISTRYINDEX)
                }

                false => {
                    warn!(target: REFERENCE_LOG, "Reference cloning failed: stack overflow.");

                    ffi::LUA_NOREF
                }
            }
        };

        trace!(target: REFERENCE_LOG, "Reference {} cloned into {key}.", self.key);

        Self {
            engine: self.engine.clone(),
            key,
        }
    }
}

impl Drop for Reference {
    #[inline(always)]
    fn drop(&mut self) {
        self.release();
    }
}

impl Reference {
    /// Stores a copy of the viewed value.
    pub fn store(object: &ObjectView<'_>) -> RuntimeResult<Self> {
        let stack = object.stack();
        let guard = StackGuard::new(stack);

        let _ = object.push_to(stack)?;

        // Safety: The value is on top of the stack.
        let key = unsafe { ffi::luaL_ref(stack.raw(), ffi::LUA_REGISTRYINDEX) };

        guard.release();

        trace!(target: REFERENCE_LOG, "Reference {key} stored.");

        Ok(Self {
            engine: stack.engine().weak(),
            key,
        })
    }

    /// Returns true if the Reference points to a value, and the engine of
    /// this value is still alive.
    #[inline(always)]
    pub fn is_valid(&self) -> bool {
        self.key != ffi::LUA_NOREF && self.engine.strong_count() > 0
    }

    /// Returns true if the Reference points to `nil`.
    #[inline(always)]
    pub fn is_nil_ref(&self) -> bool {
        self.key == ffi::LUA_REFNIL
    }

    /// Frees the engine's slot of this Reference, making the Reference
    /// invalid.
    ///
    /// Releasing an invalid Reference, or releasing it twice, does nothing.
    pub fn release(&mut self) {
        let key = self.key;

        self.key = ffi::LUA_NOREF;

        let engine = std::mem::take(&mut self.engine);

        if key == ffi::LUA_NOREF || key == ffi::LUA_REFNIL {
            return;
        }

        let Some(engine) = engine.upgrade() else {
            return;
        };

        let state = engine.main().as_ptr();

        // Safety: The main thread is alive while the engine is alive.
        unsafe {
            if ffi::lua_checkstack(state, 2) == 0 {
                warn!(target: REFERENCE_LOG, "Reference {key} leaked: stack overflow.");
                return;
            }

            ffi::luaL_unref(state, ffi::LUA_REGISTRYINDEX, key);
        }

        trace!(target: REFERENCE_LOG, "Reference {key} released.");
    }

    /// Pushes the referenced value onto `stack`.
    ///
    /// The stack may be any frame of the engine the value was stored in.
    pub fn push_to<'s>(&self, stack: &'s Stack) -> RuntimeResult<ObjectView<'s>> {
        let engine = self.live_engine().ok_or(RuntimeError::InvalidReference)?;

        if NonNull::from(engine.as_ref()) != stack.engine_ptr() {
            return Err(RuntimeError::ForeignEngine);
        }

        stack.ensure(1)?;

        match self.key {
            ffi::LUA_REFNIL => {
                let _ = stack.push_nil()?;
            }

            // Safety: Capacity reserved.
            key => unsafe {
                let _ = ffi::lua_rawgeti(stack.raw(), ffi::LUA_REGISTRYINDEX, key as _);
            },
        }

        Ok(ObjectView::new(stack, stack.top()))
    }

    /// Points this Reference to the viewed value.
    ///
    /// If the Reference already occupies a slot of the same engine, the
    /// slot is overwritten in place.
    pub fn assign(&mut self, object: &ObjectView<'_>) -> RuntimeResult<()> {
        let stack = object.stack();

        let reusable = self.key != ffi::LUA_REFNIL
            && !object.is_nil()
            && self
                .live_engine()
                .map(|engine| NonNull::from(engine.as_ref()) == stack.engine_ptr())
                .unwrap_or(false);

        if !reusable {
            let reference = Self::store(object)?;

            *self = reference;

            return Ok(());
        }

        let guard = StackGuard::new(stack);

        let _ = object.push_to(stack)?;

        // Safety: The value is on top of the stack.
        unsafe { ffi::lua_rawseti(stack.raw(), ffi::LUA_REGISTRYINDEX, self.key as _) };

        guard.release();

        trace!(target: REFERENCE_LOG, "Reference {} reassigned.", self.key);

        Ok(())
    }

    /// Opens a new frame on the main thread of the engine, pushes the
    /// referenced value, and runs `f` with the frame and the value.
    pub fn with_stack<R>(&self, f: impl FnOnce(&Stack, ObjectView<'_>) -> R) -> RuntimeResult<R> {
        let engine = self.live_engine().ok_or(RuntimeError::InvalidReference)?;

        let stack = Stack::open(engine.main(), NonNull::from(engine.as_ref()));
        let guard = StackGuard::new(&stack);

        let _ = stack.ensure(engine.config.stack_reserve);

        let object = self.push_to(&stack)?;
        let result = f(&stack, object);

        drop(guard);

        Ok(result)
    }

    #[inline(always)]
    fn live_engine(&self) -> Option<Rc<Engine>> {
        if self.key == ffi::LUA_NOREF {
            return None;
        }

        self.engine.upgrade()
    }
}

/// A persistent handle to a Lua table.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TableRef(Reference);

impl Deref for TableRef {
    type Target = Reference;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl TableRef {
    /// Stores a copy of the viewed table.
    #[inline(always)]
    pub fn store(table: &TableView<'_>) -> RuntimeResult<Self> {
        Ok(Self(Reference::store(table.as_object())?))
    }

    /// Stores the viewed value, which must be a table.
    #[inline]
    pub fn from_object(object: &ObjectView<'_>) -> RuntimeResult<Self> {
        object.expect(ValueKind::Table)?;

        Ok(Self(Reference::store(object)?))
    }

    /// Pushes the referenced table onto `stack`.
    #[inline]
    pub fn push_to<'s>(&self, stack: &'s Stack) -> RuntimeResult<TableView<'s>> {
        Ok(TableView::new_unchecked(self.0.push_to(stack)?))
    }

    /// Returns the underlying untyped Reference.
    #[inline(always)]
    pub fn into_reference(self) -> Reference {
        self.0
    }
}

/// A persistent handle to a Lua function.
///
/// ```
/// use ad_astra_lua::runtime::{FunctionRef, FunctionView, State};
///
/// let state = State::new().unwrap();
///
/// let function = state.with_stack(|stack| {
///     let function = stack
///         .execute::<FunctionView>("return function(a, b) return a * b end")
///         .unwrap();
///
///     FunctionRef::store(&function).unwrap()
/// });
///
/// assert_eq!(function.invoke::<i64>((6, 7)).unwrap(), 42);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FunctionRef(Reference);

impl Deref for FunctionRef {
    type Target = Reference;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FunctionRef {
    /// Stores a copy of the viewed function.
    #[inline(always)]
    pub fn store(function: &FunctionView<'_>) -> RuntimeResult<Self> {
        Ok(Self(Reference::store(function.as_object())?))
    }

    /// Stores the viewed value, which must be a function.
    #[inline]
    pub fn from_object(object: &ObjectView<'_>) -> RuntimeResult<Self> {
        object.expect(ValueKind::Function)?;

        Ok(Self(Reference::store(object)?))
    }

    /// Pushes the referenced function onto `stack`.
    #[inline]
    pub fn push_to<'s>(&self, stack: &'s Stack) -> RuntimeResult<FunctionView<'s>> {
        Ok(FunctionView::new_unchecked(self.0.push_to(stack)?))
    }

    /// Calls the referenced function in a new frame of the main thread and
    /// converts its results into `R`.
    pub fn invoke<R>(&self, arguments: impl PushMulti) -> RuntimeResult<R>
    where
        R: for<'s> PullMulti<'s>,
    {
        self.0
            .with_stack(|_, function| FunctionView::new_unchecked(function).invoke::<R>(arguments))?
    }

    /// Returns the underlying untyped Reference.
    #[inline(always)]
    pub fn into_reference(self) -> Reference {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{Reference, RuntimeError, State, TableRef};

    #[test]
    fn test_reference_lifecycle() {
        let state = State::new().unwrap();

        let mut reference = state.with_stack(|stack| {
            let table = stack.push_table().unwrap();

            table.raw_set("key", 10).unwrap();

            table.store().unwrap()
        });

        assert!(reference.is_valid());

        state.with_stack(|stack| {
            let table = reference.push_to(stack).unwrap().as_table().unwrap();

            assert_eq!(table.raw_get::<i64>("key").unwrap(), 10);
        });

        reference.release();
        reference.release();

        assert!(!reference.is_valid());

        state.with_stack(|stack| {
            assert_eq!(
                reference.push_to(stack).unwrap_err(),
                RuntimeError::InvalidReference
            );
            assert_eq!(stack.top(), 0);
        });
    }

    #[test]
    fn test_reference_equality() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let first = stack.push(1).unwrap().store().unwrap();
            let second = stack.push(1).unwrap().store().unwrap();

            assert_ne!(first, second);
            assert_eq!(first, first);

            let nil_a = stack.push_nil().unwrap().store().unwrap();
            let nil_b = stack.push_nil().unwrap().store().unwrap();

            assert!(nil_a.is_nil_ref());
            assert_eq!(nil_a, nil_b);
            assert_eq!(Reference::default(), Reference::default());
            assert_ne!(nil_a, Reference::default());
        });
    }

    #[test]
    fn test_reference_reassign() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let mut reference = stack.push("first").unwrap().store().unwrap();
            let before = format!("{reference:?}");

            reference.assign(&stack.push("second").unwrap()).unwrap();

            assert_eq!(format!("{reference:?}"), before);
            assert_eq!(
                reference.push_to(stack).unwrap().get::<String>().unwrap(),
                "second"
            );

            reference.assign(&stack.push_nil().unwrap()).unwrap();

            assert!(reference.is_nil_ref());

            reference.assign(&stack.push(3).unwrap()).unwrap();

            assert_eq!(reference.push_to(stack).unwrap().get::<i64>().unwrap(), 3);
        });
    }

    #[test]
    fn test_reference_outlives_state() {
        let reference = {
            let state = State::new().unwrap();

            state.with_stack(|stack| stack.push_table().unwrap().store().unwrap())
        };

        assert!(!reference.is_valid());
        assert_eq!(
            reference.with_stack(|_, _| ()).unwrap_err(),
            RuntimeError::InvalidReference
        );
    }

    #[test]
    fn test_reference_foreign_engine() {
        let first = State::new().unwrap();
        let second = State::new().unwrap();

        let reference = first.with_stack(|stack| stack.push(1).unwrap().store().unwrap());

        second.with_stack(|stack| {
            assert_eq!(
                reference.push_to(stack).unwrap_err(),
                RuntimeError::ForeignEngine
            );
        });
    }

    #[test]
    fn test_typed_references() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let number = stack.push(1).unwrap();

            assert!(TableRef::from_object(&number).is_err());

            let table = stack.push_table().unwrap();
            let table = TableRef::store(&table).unwrap();
            let copy = table.clone();

            assert_ne!(table, copy);
            assert!(table.push_to(stack).unwrap().raw_equal(&copy.push_to(stack).unwrap()));
        });
    }
}
