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
    fmt::{Debug, Display, Formatter},
    ops::Deref,
};

use compact_str::CompactString;
use mlua_sys as ffi;

use crate::runtime::{
    function::finish_call,
    FromObject,
    IntoStack,
    ObjectView,
    PullMulti,
    PushMulti,
    RuntimeError,
    RuntimeResult,
    Stack,
    StackGuard,
    TableRef,
    ValueKind,
};

/// A typed view of a stack slot holding a Lua table.
///
/// The view dereferences to the underlying [ObjectView].
#[derive(Clone, Copy)]
pub struct TableView<'s>(ObjectView<'s>);

impl<'s> Debug for TableView<'s> {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_tuple("TableView")
            .field(&self.0.index())
            .finish()
    }
}

impl<'s> Deref for TableView<'s> {
    type Target = ObjectView<'s>;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'s> TableView<'s> {
    #[inline(always)]
    pub(crate) fn new_unchecked(object: ObjectView<'s>) -> Self {
        Self(object)
    }

    /// Returns the untyped view of the table slot.
    #[inline(always)]
    pub fn as_object(&self) -> &ObjectView<'s> {
        &self.0
    }

    /// Stores the table as a persistent [TableRef].
    #[inline(always)]
    pub fn store_table(&self) -> RuntimeResult<TableRef> {
        TableRef::store(self)
    }

    /// Returns the length of the table as computed by the `#` operator,
    /// calling the `__len` meta-method if needed.
    pub fn len(&self) -> RuntimeResult<i64> {
        let stack = self.0.stack();
        let guard = StackGuard::new(stack);

        let _ = self.0.push_to(stack)?;

        stack.protected_len()?;

        let length = stack.top_object()?.get::<i64>()?;

        drop(guard);

        Ok(length)
    }

    /// Returns the length of the table's sequence without calling
    /// meta-methods.
    #[inline]
    pub fn raw_len(&self) -> RuntimeResult<usize> {
        let raw = self.0.raw_index()?;

        // Safety: The index is valid.
        Ok(unsafe { ffi::lua_rawlen(self.0.stack().raw(), raw) } as usize)
    }

    /// Reads `table[key]` without calling meta-methods.
    pub fn raw_get<T: FromObject<'s>>(&self, key: impl IntoStack) -> RuntimeResult<T> {
        let stack = self.0.stack();
        let raw = self.0.raw_index()?;
        let guard = StackGuard::new(stack);

        let _ = stack.push(key)?;

        // Safety: The index is valid, the key is on top.
        let _ = unsafe { ffi::lua_rawget(stack.raw(), raw) };

        let value = T::from_object(ObjectView::new(stack, stack.top()))?;

        match T::RETAINS_SLOT {
            true => guard.release(),
            false => drop(guard),
        }

        Ok(value)
    }

    /// Assigns `table[key] = value` without calling meta-methods.
    ///
    /// The key must not be `nil` or NaN.
    pub fn raw_set(&self, key: impl IntoStack, value: impl IntoStack) -> RuntimeResult<()> {
        let stack = self.0.stack();
        let raw = self.0.raw_index()?;
        let guard = StackGuard::new(stack);

        let key = stack.push(key)?;

        check_key(&key)?;

        let _ = stack.push(value)?;

        // Safety: The index is valid, the key and the value are on top.
        unsafe { ffi::lua_rawset(stack.raw(), raw) };

        drop(guard);

        Ok(())
    }

    /// Calls `f` for every key-value pair of the table, in the engine's
    /// traversal order.
    ///
    /// The table must not receive new keys during the traversal.
    pub fn for_each(
        &self,
        mut f: impl FnMut(ObjectView<'s>, ObjectView<'s>) -> RuntimeResult<()>,
    ) -> RuntimeResult<()> {
        let stack = self.0.stack();
        let raw = self.0.raw_index()?;
        let guard = StackGuard::new(stack);

        let _ = stack.push_nil()?;

        let key = stack.top();

        loop {
            stack.ensure(2)?;

            // Safety: The index is valid, the previous key is on top.
            if unsafe { ffi::lua_next(stack.raw(), raw) } == 0 {
                break;
            }

            f(ObjectView::new(stack, key), ObjectView::new(stack, key + 1))?;

            stack.set_top(key)?;
        }

        drop(guard);

        Ok(())
    }
}

/// A key of a [TableIndexPath].
#[derive(Clone, Debug)]
pub enum PathKey<'s> {
    Str(CompactString),
    Int(i64),
    Num(f64),
    Bool(bool),
    View(ObjectView<'s>),
}

impl<'s> Display for PathKey<'s> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str(key) => formatter.write_str(key),
            Self::Int(key) => Display::fmt(key, formatter),
            Self::Num(key) => Debug::fmt(key, formatter),
            Self::Bool(key) => Display::fmt(key, formatter),
            Self::View(key) => Display::fmt(key, formatter),
        }
    }
}

impl<'s, 'a> From<&'a str> for PathKey<'s> {
    #[inline(always)]
    fn from(value: &'a str) -> Self {
        Self::Str(CompactString::from(value))
    }
}

impl<'s> From<String> for PathKey<'s> {
    #[inline(always)]
    fn from(value: String) -> Self {
        Self::Str(CompactString::from(value))
    }
}

impl<'s> From<CompactString> for PathKey<'s> {
    #[inline(always)]
    fn from(value: CompactString) -> Self {
        Self::Str(value)
    }
}

impl<'s> From<i32> for PathKey<'s> {
    #[inline(always)]
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl<'s> From<i64> for PathKey<'s> {
    #[inline(always)]
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl<'s> From<f64> for PathKey<'s> {
    #[inline(always)]
    fn from(value: f64) -> Self {
        Self::Num(value)
    }
}

impl<'s> From<bool> for PathKey<'s> {
    #[inline(always)]
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<'s> From<ObjectView<'s>> for PathKey<'s> {
    #[inline(always)]
    fn from(value: ObjectView<'s>) -> Self {
        Self::View(value)
    }
}

impl<'s> IntoStack for PathKey<'s> {
    fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
        match self {
            Self::Str(key) => key.push_into(stack),
            Self::Int(key) => key.push_into(stack),
            Self::Num(key) => key.push_into(stack),
            Self::Bool(key) => key.push_into(stack),
            Self::View(key) => key.push_into(stack),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum PathRoot<'s> {
    Object(ObjectView<'s>),
    Globals,
}

/// A chain of index accesses rooted in a table-like value.
///
/// The path does not touch the engine until it is committed with
/// [get](Self::get), [traverse_get](Self::traverse_get), [set](Self::set),
/// or one of the invocation functions. Each commit leaves the frame height
/// unchanged, except for the final value when it is converted into a view.
///
/// ```
/// use ad_astra_lua::runtime::State;
///
/// let state = State::new().unwrap();
///
/// state.with_stack(|stack| {
///     stack.execute::<()>("config = { window = { width = 640 } }").unwrap();
///
///     stack.global("config").at("window").at("height").set(480).unwrap();
///
///     assert_eq!(
///         stack.global("config").at("window").at("height").get::<i64>().unwrap(),
///         480,
///     );
///
///     assert_eq!(
///         stack.global("config").at("width").at("value").traverse_get::<i64>().unwrap(),
///         None,
///     );
///
///     assert_eq!(stack.top(), 0);
/// });
/// ```
#[derive(Clone)]
pub struct TableIndexPath<'s> {
    stack: &'s Stack,
    root: PathRoot<'s>,
    keys: Vec<PathKey<'s>>,
}

impl<'s> Debug for TableIndexPath<'s> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.root {
            PathRoot::Object(object) => Display::fmt(object, formatter)?,
            PathRoot::Globals => formatter.write_str("_G")?,
        }

        for key in &self.keys {
            formatter.write_fmt(format_args!("[{key}]"))?;
        }

        Ok(())
    }
}

enum Walk {
    Done,
    NotTableLike(ValueKind),
}

impl<'s> TableIndexPath<'s> {
    /// Creates an empty path rooted in the viewed value.
    #[inline(always)]
    pub fn new(root: ObjectView<'s>) -> Self {
        Self {
            stack: root.stack(),
            root: PathRoot::Object(root),
            keys: Vec::new(),
        }
    }

    /// Creates an empty path rooted in the table of global variables.
    #[inline(always)]
    pub fn globals(stack: &'s Stack) -> Self {
        Self {
            stack,
            root: PathRoot::Globals,
            keys: Vec::new(),
        }
    }

    /// Appends a key to the path.
    #[inline(always)]
    pub fn at(mut self, key: impl Into<PathKey<'s>>) -> Self {
        self.keys.push(key.into());
        self
    }

    /// Reads the value at the end of the path.
    ///
    /// Fails with [TypeMismatch](RuntimeError::TypeMismatch) if any value
    /// along the path cannot be indexed.
    pub fn get<T: FromObject<'s>>(self) -> RuntimeResult<T> {
        match self.traverse_get_inner()? {
            Ok(value) => Ok(value),
            Err(found) => Err(RuntimeError::TypeMismatch {
                expected: "table".into(),
                found,
            }),
        }
    }

    /// Reads the value at the end of the path.
    ///
    /// Unlike [get](Self::get), returns [None] if any value along the path
    /// cannot be indexed.
    pub fn traverse_get<T: FromObject<'s>>(self) -> RuntimeResult<Option<T>> {
        Ok(self.traverse_get_inner()?.ok())
    }

    /// Assigns `value` to the last key of the path, calling the
    /// `__newindex` meta-method if needed.
    pub fn set(mut self, value: impl IntoStack) -> RuntimeResult<()> {
        let stack = self.stack;
        let guard = StackGuard::new(stack);

        let Some(last) = self.keys.pop() else {
            return Err(RuntimeError::TypeMismatch {
                expected: "table key".into(),
                found: ValueKind::None,
            });
        };

        if let Walk::NotTableLike(found) = self.walk()? {
            return Err(RuntimeError::TypeMismatch {
                expected: "table".into(),
                found,
            });
        }

        if !stack.is_table_like_for_write(-1) {
            return Err(RuntimeError::TypeMismatch {
                expected: "table".into(),
                found: stack.kind(-1),
            });
        }

        let container = stack.raw_top();

        let key = stack.push(last)?;

        check_key(&key)?;

        let _ = stack.push(value)?;

        stack.protected_set(container)?;

        drop(guard);

        Ok(())
    }

    /// Calls the function at the end of the path and converts its results
    /// into `R`.
    pub fn invoke<R: PullMulti<'s>>(self, arguments: impl PushMulti) -> RuntimeResult<R> {
        let stack = self.stack;
        let guard = StackGuard::new(stack);

        let function = stack.top() + 1;

        self.resolve_full()?;

        if !stack.is_function(function) {
            return Err(RuntimeError::TypeMismatch {
                expected: "function".into(),
                found: stack.kind(function),
            });
        }

        let count = stack.push_multi(arguments)?;
        let result = finish_call::<R>(stack, function, count)?;

        guard.release();

        Ok(result)
    }

    /// Calls the function at the end of the path, passing the value that
    /// holds this function as the first argument (the `obj:method(...)`
    /// call of Lua).
    pub fn invoke_method<R: PullMulti<'s>>(
        mut self,
        arguments: impl PushMulti,
    ) -> RuntimeResult<R> {
        let stack = self.stack;
        let guard = StackGuard::new(stack);

        let function = stack.top() + 1;

        let Some(last) = self.keys.pop() else {
            return Err(RuntimeError::TypeMismatch {
                expected: "table key".into(),
                found: ValueKind::None,
            });
        };

        if let Walk::NotTableLike(found) = self.walk()? {
            return Err(RuntimeError::TypeMismatch {
                expected: "table".into(),
                found,
            });
        }

        if let Walk::NotTableLike(found) = self.step(last)? {
            return Err(RuntimeError::TypeMismatch {
                expected: "table".into(),
                found,
            });
        }

        stack.insert(function)?;

        if !stack.is_function(function) {
            return Err(RuntimeError::TypeMismatch {
                expected: "function".into(),
                found: stack.kind(function),
            });
        }

        let count = stack.push_multi(arguments)?;
        let result = finish_call::<R>(stack, function, count + 1)?;

        guard.release();

        Ok(result)
    }

    fn traverse_get_inner<T: FromObject<'s>>(self) -> RuntimeResult<Result<T, ValueKind>> {
        let stack = self.stack;
        let guard = StackGuard::new(stack);

        if let Walk::NotTableLike(found) = self.walk()? {
            return Ok(Err(found));
        }

        let value = T::from_object(ObjectView::new(stack, stack.top()))?;

        match T::RETAINS_SLOT {
            true => guard.release(),
            false => drop(guard),
        }

        Ok(Ok(value))
    }

    // Leaves the value at the end of the path in a single new slot.
    fn resolve_full(&self) -> RuntimeResult<()> {
        match self.walk()? {
            Walk::Done => Ok(()),
            Walk::NotTableLike(found) => Err(RuntimeError::TypeMismatch {
                expected: "table".into(),
                found,
            }),
        }
    }

    // Pushes the root and follows every key, keeping a single slot with
    // the current value on top of the frame.
    fn walk(&self) -> RuntimeResult<Walk> {
        match &self.root {
            PathRoot::Object(object) => {
                let _ = object.push_to(self.stack)?;
            }

            PathRoot::Globals => {
                let _ = self.stack.globals()?;
            }
        }

        for key in &self.keys {
            if let Walk::NotTableLike(found) = self.step(key.clone())? {
                return Ok(Walk::NotTableLike(found));
            }

            let stack = self.stack;

            stack.replace(-2)?;
        }

        Ok(Walk::Done)
    }

    // Pushes `current[key]` above the current value.
    fn step(&self, key: PathKey<'s>) -> RuntimeResult<Walk> {
        let stack = self.stack;

        if !stack.is_table_like(-1) {
            return Ok(Walk::NotTableLike(stack.kind(-1)));
        }

        let container = stack.raw_top();

        let _ = stack.push(key)?;

        stack.protected_get(container)?;

        Ok(Walk::Done)
    }
}

fn check_key(key: &ObjectView<'_>) -> RuntimeResult<()> {
    let valid = match key.kind() {
        ValueKind::Nil => false,
        ValueKind::Number => !key.as_number().map(f64::is_nan).unwrap_or(true),
        _ => true,
    };

    match valid {
        true => Ok(()),
        false => Err(RuntimeError::TypeMismatch {
            expected: "table key".into(),
            found: key.kind(),
        }),
    }
}
