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
    fmt::{Debug, Display, Formatter},
    ptr::NonNull,
    slice::from_raw_parts,
};

use mlua_sys as ffi;

use crate::runtime::{
    FromObject,
    FunctionView,
    PathKey,
    Reference,
    RuntimeError,
    RuntimeResult,
    Stack,
    StackGuard,
    TableIndexPath,
    TableView,
    ValueKind,
};

/// A non-owning handle to one slot of a [Stack] frame.
///
/// The view does not keep the value alive: removing the slot, or any slot
/// below it, makes the view address a different value. Use
/// [store](Self::store) to keep the value beyond the frame.
#[derive(Clone, Copy)]
pub struct ObjectView<'s> {
    stack: &'s Stack,
    index: i32,
}

impl<'s> Debug for ObjectView<'s> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("ObjectView")
            .field("index", &self.index)
            .field("kind", &self.kind())
            .finish()
    }
}

impl<'s> Display for ObjectView<'s> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind() {
            ValueKind::None => formatter.write_str("<none>"),

            ValueKind::Nil => formatter.write_str("nil"),

            ValueKind::Boolean => match self.as_boolean() {
                Ok(true) => formatter.write_str("true"),
                _ => formatter.write_str("false"),
            },

            ValueKind::Number => match self.is_integer() {
                true => match self.as_integer() {
                    Ok(value) => Display::fmt(&value, formatter),
                    Err(_) => formatter.write_str("<number>"),
                },

                false => match self.as_number() {
                    Ok(value) => Debug::fmt(&value, formatter),
                    Err(_) => formatter.write_str("<number>"),
                },
            },

            ValueKind::String => {
                let result = self.with_bytes(|bytes| {
                    formatter.write_fmt(format_args!("{:?}", String::from_utf8_lossy(bytes)))
                });

                match result {
                    Ok(result) => result,
                    Err(_) => formatter.write_str("<string>"),
                }
            }

            ValueKind::Table => formatter.write_str("<table>"),

            ValueKind::Function => formatter.write_str("<function>"),

            ValueKind::Thread => formatter.write_str("<coroutine>"),

            ValueKind::UserData => formatter.write_str("<userdata>"),

            ValueKind::LightUserData => formatter.write_str("<light userdata>"),
        }
    }
}

impl<'s, 'o> PartialEq<ObjectView<'o>> for ObjectView<'s> {
    #[inline(always)]
    fn eq(&self, other: &ObjectView<'o>) -> bool {
        self.raw_equal(other)
    }
}

impl<'s> ObjectView<'s> {
    #[inline(always)]
    pub(crate) fn new(stack: &'s Stack, index: i32) -> Self {
        Self { stack, index }
    }

    /// Returns the frame this view belongs to.
    #[inline(always)]
    pub fn stack(&self) -> &'s Stack {
        self.stack
    }

    /// Returns the index of the slot counted from the bottom of the frame,
    /// or a pseudo-index.
    #[inline(always)]
    pub fn index(&self) -> i32 {
        self.index
    }

    #[inline(always)]
    pub(crate) fn raw_index(&self) -> RuntimeResult<c_int> {
        self.stack.raw_index(self.index)
    }

    /// Returns the kind of the viewed value.
    #[inline(always)]
    pub fn kind(&self) -> ValueKind {
        self.stack.kind(self.index)
    }

    /// Returns true if the viewed value is `nil`.
    #[inline(always)]
    pub fn is_nil(&self) -> bool {
        self.stack.is_nil(self.index)
    }

    /// Returns true if the viewed value is a boolean.
    #[inline(always)]
    pub fn is_boolean(&self) -> bool {
        self.stack.is_boolean(self.index)
    }

    /// Returns true if the viewed value is a number.
    #[inline(always)]
    pub fn is_number(&self) -> bool {
        self.stack.is_number(self.index)
    }

    /// Returns true if the viewed value is a number with integer
    /// representation.
    #[inline(always)]
    pub fn is_integer(&self) -> bool {
        self.stack.is_integer(self.index)
    }

    /// Returns true if the viewed value is a string.
    #[inline(always)]
    pub fn is_string(&self) -> bool {
        self.stack.is_string(self.index)
    }

    /// Returns true if the viewed value is a table.
    #[inline(always)]
    pub fn is_table(&self) -> bool {
        self.stack.is_table(self.index)
    }

    /// Returns true if the viewed value can be indexed for reading.
    #[inline(always)]
    pub fn is_table_like(&self) -> bool {
        self.stack.is_table_like(self.index)
    }

    /// Returns true if the viewed value is a function.
    #[inline(always)]
    pub fn is_function(&self) -> bool {
        self.stack.is_function(self.index)
    }

    /// Returns true if the viewed value is a coroutine.
    #[inline(always)]
    pub fn is_thread(&self) -> bool {
        self.stack.is_thread(self.index)
    }

    /// Returns true if the viewed value is a foreign object.
    #[inline(always)]
    pub fn is_user_data(&self) -> bool {
        self.stack.is_user_data(self.index)
    }

    /// Returns true if the viewed value is a bare pointer.
    #[inline(always)]
    pub fn is_light_user_data(&self) -> bool {
        self.stack.is_light_user_data(self.index)
    }

    /// Tests whether the viewed value can be converted into `T` without
    /// converting it.
    #[inline(always)]
    pub fn is<T: FromObject<'s>>(&self) -> bool {
        T::probe(self)
    }

    /// Converts the viewed value into `T`. The slot stays on the stack.
    #[inline(always)]
    pub fn get<T: FromObject<'s>>(&self) -> RuntimeResult<T> {
        T::from_object(*self)
    }

    /// Returns the viewed boolean. Other kinds of values are rejected.
    pub fn as_boolean(&self) -> RuntimeResult<bool> {
        self.expect(ValueKind::Boolean)?;

        let raw = self.raw_index()?;

        // Safety: The index is valid.
        Ok(unsafe { ffi::lua_toboolean(self.stack.raw(), raw) != 0 })
    }

    /// Returns the viewed number as an integer. Floating-point numbers
    /// without exact integer representation are rejected.
    pub fn as_integer(&self) -> RuntimeResult<i64> {
        self.expect(ValueKind::Number)?;

        let raw = self.raw_index()?;
        let mut is_integer = 0;

        // Safety: The index is valid.
        let value = unsafe { ffi::lua_tointegerx(self.stack.raw(), raw, &mut is_integer) };

        match is_integer != 0 {
            true => Ok(value as i64),
            false => Err(RuntimeError::TypeMismatch {
                expected: "integer".into(),
                found: ValueKind::Number,
            }),
        }
    }

    /// Returns the viewed number as a floating-point number.
    pub fn as_number(&self) -> RuntimeResult<f64> {
        self.expect(ValueKind::Number)?;

        let raw = self.raw_index()?;

        // Safety: The index is valid.
        Ok(unsafe { ffi::lua_tonumberx(self.stack.raw(), raw, std::ptr::null_mut()) } as f64)
    }

    /// Returns a copy of the viewed string. Numbers are not converted.
    pub fn as_string(&self) -> RuntimeResult<String> {
        self.with_bytes(|bytes| match std::str::from_utf8(bytes) {
            Ok(string) => Ok(String::from(string)),
            Err(cause) => Err(RuntimeError::Utf8 { cause }),
        })?
    }

    /// Runs `f` with the bytes of the viewed string.
    pub fn with_bytes<R>(&self, f: impl FnOnce(&[u8]) -> R) -> RuntimeResult<R> {
        self.expect(ValueKind::String)?;

        let raw = self.raw_index()?;
        let mut length = 0;

        // Safety: The index holds a string, the engine does not convert it in
        //         place, and the slot outlives the borrow.
        let bytes = unsafe {
            let data = ffi::lua_tolstring(self.stack.raw(), raw, &mut length);

            match data.is_null() {
                true => &[][..],
                false => from_raw_parts(data as *const u8, length),
            }
        };

        Ok(f(bytes))
    }

    /// Returns a typed view of the viewed table.
    #[inline]
    pub fn as_table(&self) -> RuntimeResult<TableView<'s>> {
        self.expect(ValueKind::Table)?;

        Ok(TableView::new_unchecked(*self))
    }

    /// Returns a typed view of the viewed function.
    #[inline]
    pub fn as_function(&self) -> RuntimeResult<FunctionView<'s>> {
        self.expect(ValueKind::Function)?;

        Ok(FunctionView::new_unchecked(*self))
    }

    /// Returns the address of the viewed foreign object's storage, or the
    /// pointer of the viewed light user data.
    pub fn as_user_data(&self) -> RuntimeResult<NonNull<u8>> {
        match self.kind() {
            ValueKind::UserData | ValueKind::LightUserData => (),
            found => {
                return Err(RuntimeError::TypeMismatch {
                    expected: "userdata".into(),
                    found,
                })
            }
        }

        let raw = self.raw_index()?;

        // Safety: The index is valid.
        let data = unsafe { ffi::lua_touserdata(self.stack.raw(), raw) };

        NonNull::new(data as *mut u8).ok_or(RuntimeError::TypeMismatch {
            expected: "userdata".into(),
            found: ValueKind::Nil,
        })
    }

    /// Returns the size in bytes of the viewed foreign object's storage.
    pub fn user_data_len(&self) -> RuntimeResult<usize> {
        self.expect(ValueKind::UserData)?;

        let raw = self.raw_index()?;

        // Safety: The index is valid.
        Ok(unsafe { ffi::lua_rawlen(self.stack.raw(), raw) } as usize)
    }

    /// Pushes a copy of the viewed value onto `target`.
    ///
    /// The target may be this frame, or a frame of another thread of the
    /// same engine. Pushing into another frame of the same thread fails with
    /// [ForeignFrame](RuntimeError::ForeignFrame).
    pub fn push_to<'t>(&self, target: &'t Stack) -> RuntimeResult<ObjectView<'t>> {
        let source = self.stack;

        if source.engine_ptr() != target.engine_ptr() {
            return Err(RuntimeError::ForeignEngine);
        }

        let raw = self.raw_index()?;

        target.ensure(1)?;

        match source.raw() == target.raw() {
            true => {
                if source.base() != target.base() {
                    return Err(RuntimeError::ForeignFrame);
                }

                // Safety: The index is valid and the capacity is reserved.
                unsafe { ffi::lua_pushvalue(target.raw(), raw) };
            }

            false => {
                source.ensure(1)?;

                // Safety: Both threads belong to the same engine, the
                //         capacity is reserved on both of them.
                unsafe {
                    ffi::lua_pushvalue(source.raw(), raw);
                    ffi::lua_xmove(source.raw(), target.raw(), 1);
                }
            }
        }

        Ok(ObjectView::new(target, target.top()))
    }

    /// Overwrites the viewed slot with the value of `other`.
    pub fn replace_with(&self, other: &ObjectView<'s>) -> RuntimeResult<()> {
        let _ = other.push_to(self.stack)?;

        self.stack.replace(self.index)
    }

    /// Stores the viewed value as a persistent [Reference].
    #[inline(always)]
    pub fn store(&self) -> RuntimeResult<Reference> {
        Reference::store(self)
    }

    /// Returns true if both views address the same value without calling
    /// meta-methods. Views of different frames are compared through their
    /// engine identity.
    pub fn raw_equal(&self, other: &ObjectView<'_>) -> bool {
        if self.stack.raw() == other.stack.raw() {
            return match (self.raw_index(), other.raw_index()) {
                // Safety: Both indices are valid.
                (Ok(a), Ok(b)) => unsafe { ffi::lua_rawequal(self.stack.raw(), a, b) != 0 },
                _ => false,
            };
        }

        let guard = StackGuard::new(self.stack);

        let Ok(other) = other.push_to(self.stack) else {
            return false;
        };

        let result = self.stack.same(self.index, other.index);

        drop(guard);

        result
    }

    /// Compares the viewed value with `other` using the `==` operator of
    /// Lua.
    #[inline(always)]
    pub fn equals(&self, other: &ObjectView<'s>) -> RuntimeResult<bool> {
        self.stack.equal(*self, *other)
    }

    /// Pushes the metatable of the viewed value, if any.
    pub fn metatable(&self) -> RuntimeResult<Option<TableView<'s>>> {
        let raw = self.raw_index()?;

        self.stack.ensure(1)?;

        // Safety: The index is valid and the capacity is reserved.
        match unsafe { ffi::lua_getmetatable(self.stack.raw(), raw) } != 0 {
            true => Ok(Some(TableView::new_unchecked(ObjectView::new(
                self.stack,
                self.stack.top(),
            )))),

            false => Ok(None),
        }
    }

    /// Sets or clears the metatable of the viewed value.
    pub fn set_metatable(&self, metatable: Option<&TableView<'_>>) -> RuntimeResult<()> {
        let raw = self.raw_index()?;
        let guard = StackGuard::new(self.stack);

        match metatable {
            Some(metatable) => {
                let _ = metatable.push_to(self.stack)?;
            }

            None => {
                let _ = self.stack.push_nil()?;
            }
        }

        // Safety: The index is valid and the metatable is on top.
        let _ = unsafe { ffi::lua_setmetatable(self.stack.raw(), raw) };

        guard.release();

        Ok(())
    }

    /// Starts an index path rooted in the viewed value.
    #[inline(always)]
    pub fn at(&self, key: impl Into<PathKey<'s>>) -> TableIndexPath<'s> {
        TableIndexPath::new(*self).at(key)
    }

    /// Opens a frame on the viewed coroutine and runs `f` with it.
    pub fn with_thread<R>(&self, f: impl FnOnce(&Stack) -> R) -> RuntimeResult<R> {
        let raw = self.raw_index()?;

        // Safety: The index is valid.
        let thread = unsafe { ffi::lua_tothread(self.stack.raw(), raw) };

        let Some(thread) = NonNull::new(thread) else {
            return Err(RuntimeError::TypeMismatch {
                expected: "thread".into(),
                found: self.kind(),
            });
        };

        let frame = Stack::open(thread, self.stack.engine_ptr());
        let guard = StackGuard::new(&frame);

        let result = f(&frame);

        drop(guard);

        Ok(result)
    }

    #[inline(always)]
    pub(crate) fn expect(&self, expected: ValueKind) -> RuntimeResult<()> {
        let found = self.kind();

        match found == expected {
            true => Ok(()),
            false => Err(RuntimeError::TypeMismatch {
                expected: expected.name().into(),
                found,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{RuntimeError, State, ValueKind};

    #[test]
    fn test_typed_accessors() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let flag = stack.push(true).unwrap();
            let integer = stack.push(42).unwrap();
            let float = stack.push(1.5).unwrap();
            let string = stack.push("text").unwrap();

            assert!(flag.as_boolean().unwrap());
            assert_eq!(integer.as_integer().unwrap(), 42);
            assert_eq!(float.as_number().unwrap(), 1.5);
            assert_eq!(string.as_string().unwrap(), "text");

            assert_eq!(
                string.as_boolean(),
                Err(RuntimeError::TypeMismatch {
                    expected: "boolean".into(),
                    found: ValueKind::String,
                }),
            );

            assert!(float.as_integer().is_err());
            assert!(integer.as_table().is_err());
            assert!(flag.as_function().is_err());
            assert_eq!(stack.top(), 4);
        });
    }

    #[test]
    fn test_display() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            assert_eq!(stack.push_nil().unwrap().to_string(), "nil");
            assert_eq!(stack.push(false).unwrap().to_string(), "false");
            assert_eq!(stack.push(7).unwrap().to_string(), "7");
            assert_eq!(stack.push(0.5).unwrap().to_string(), "0.5");
            assert_eq!(stack.push("a").unwrap().to_string(), "\"a\"");
            assert_eq!(stack.push_table().unwrap().to_string(), "<table>");
            assert_eq!(stack.push_thread().unwrap().to_string(), "<coroutine>");
        });
    }

    #[test]
    fn test_cannot_move_between_nested_frames() {
        let state = State::new().unwrap();

        state.with_stack(|outer| {
            let object = outer.push(true).unwrap();

            state.with_stack(|inner| {
                assert_eq!(object.push_to(inner).unwrap_err(), RuntimeError::ForeignFrame);
                assert_eq!(inner.top(), 0);
            });

            assert_eq!(outer.top(), 1);
        });
    }

    #[test]
    fn test_cannot_move_between_engines() {
        let first = State::new().unwrap();
        let second = State::new().unwrap();

        first.with_stack(|a| {
            let object = a.push(1).unwrap();

            second.with_stack(|b| {
                assert_eq!(object.push_to(b).unwrap_err(), RuntimeError::ForeignEngine);
            });
        });
    }

    #[test]
    fn test_move_to_thread() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let table = stack.push_table().unwrap();
            let thread = stack.push_thread().unwrap();

            thread
                .with_thread(|coroutine| {
                    let moved = table.push_to(coroutine).unwrap();

                    assert_eq!(coroutine.top(), 1);
                    assert!(moved.raw_equal(&table));

                    let back = moved.push_to(stack).unwrap();

                    assert!(back.raw_equal(&table));
                })
                .unwrap();

            assert_eq!(stack.top(), 3);
            assert!(table.with_thread(|_| ()).is_err());
        });
    }

    #[test]
    fn test_replace_with() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let a = stack.push(1).unwrap();
            let _ = stack.push(2).unwrap();
            let c = stack.push(3).unwrap();

            let size = stack.top();

            a.replace_with(&c).unwrap();

            assert_eq!(stack.top(), size);
            assert_eq!(a.as_integer().unwrap(), 3);
            assert_eq!(c.as_integer().unwrap(), 3);
        });
    }

    #[test]
    fn test_metatable() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let table = stack.push_table().unwrap();

            assert!(table.metatable().unwrap().is_none());

            let meta = stack.push_table().unwrap();

            table.set_metatable(Some(&meta)).unwrap();

            let found = table.metatable().unwrap().unwrap();

            assert!(found.raw_equal(&meta));

            table.set_metatable(None).unwrap();

            assert!(table.metatable().unwrap().is_none());
        });
    }
}
