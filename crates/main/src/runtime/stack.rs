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
    ffi::{c_char, c_int, CStr, CString},
    fmt::{Debug, Display, Formatter},
    ptr::NonNull,
};

use mlua_sys as ffi;

use crate::runtime::{
    function::finish_call,
    state::Engine,
    FunctionView,
    IntoStack,
    ObjectView,
    PullMulti,
    PushMulti,
    Reference,
    RuntimeError,
    RuntimeResult,
    TableIndexPath,
    TableView,
};

/// A kind of value stored in a stack slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum ValueKind {
    /// The slot does not exist.
    None,

    /// Lua `nil`.
    Nil,

    /// Lua `true` or `false`.
    Boolean,

    /// A bare pointer without a metatable of its own.
    LightUserData,

    /// An integer or a floating-point number.
    Number,

    /// A byte string.
    String,

    /// A Lua table.
    Table,

    /// A Lua function or a host function.
    Function,

    /// A foreign object allocated by the engine.
    UserData,

    /// A coroutine.
    Thread,
}

impl Display for ValueKind {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.name())
    }
}

impl ValueKind {
    /// Returns the name of this kind in Lua terms.
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "no value",
            Self::Nil => "nil",
            Self::Boolean => "boolean",
            Self::LightUserData => "light userdata",
            Self::Number => "number",
            Self::String => "string",
            Self::Table => "table",
            Self::Function => "function",
            Self::UserData => "userdata",
            Self::Thread => "thread",
        }
    }

    #[inline]
    pub(crate) fn from_tag(tag: c_int) -> Self {
        match tag {
            ffi::LUA_TNIL => Self::Nil,
            ffi::LUA_TBOOLEAN => Self::Boolean,
            ffi::LUA_TLIGHTUSERDATA => Self::LightUserData,
            ffi::LUA_TNUMBER => Self::Number,
            ffi::LUA_TSTRING => Self::String,
            ffi::LUA_TTABLE => Self::Table,
            ffi::LUA_TFUNCTION => Self::Function,
            ffi::LUA_TUSERDATA => Self::UserData,
            ffi::LUA_TTHREAD => Self::Thread,
            _ => Self::None,
        }
    }
}

/// A call frame on the evaluation stack of a Lua thread.
///
/// The Stack is the entry point of all value exchange with the engine. It is
/// obtained through [State::with_stack](crate::runtime::State::with_stack),
/// through [Stack::with_stack] for a nested frame, or as the argument of a
/// raw host function called from Lua.
///
/// Positive indices address slots relative to the bottom of the frame
/// (the first slot is `1`), negative indices count from the top of the frame
/// (`-1` is the top slot). An index may not reach below the frame. The
/// pseudo-indices of the engine (the registry and upvalue indices) are
/// accepted as is.
///
/// When the frame ends, the stack height is restored to the height the frame
/// started with.
pub struct Stack {
    state: NonNull<ffi::lua_State>,
    base: c_int,
    engine: NonNull<Engine>,
}

impl Debug for Stack {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Stack")
            .field("base", &self.base)
            .field("top", &self.top())
            .finish_non_exhaustive()
    }
}

impl Stack {
    // Safety: `state` is a live thread of an engine created by State, and
    //         `base` does not exceed its current height.
    #[inline]
    pub(crate) unsafe fn from_raw(state: *mut ffi::lua_State, base: c_int) -> Self {
        let engine = Engine::lookup(state);

        Self {
            state: NonNull::new_unchecked(state),
            base,
            engine,
        }
    }

    // Opens a frame on top of the current height of the thread.
    #[inline]
    pub(crate) fn open(state: NonNull<ffi::lua_State>, engine: NonNull<Engine>) -> Self {
        // Safety: The caller owns a live thread.
        let base = unsafe { ffi::lua_gettop(state.as_ptr()) };

        Self {
            state,
            base,
            engine,
        }
    }

    #[inline(always)]
    pub(crate) fn raw(&self) -> *mut ffi::lua_State {
        self.state.as_ptr()
    }

    #[inline(always)]
    pub(crate) fn base(&self) -> c_int {
        self.base
    }

    #[inline(always)]
    pub(crate) fn engine(&self) -> &Engine {
        // Safety: Frames exist only while the engine owning the thread is
        //         alive.
        unsafe { self.engine.as_ref() }
    }

    #[inline(always)]
    pub(crate) fn engine_ptr(&self) -> NonNull<Engine> {
        self.engine
    }

    #[inline(always)]
    pub(crate) fn raw_top(&self) -> c_int {
        // Safety: The thread is alive.
        unsafe { ffi::lua_gettop(self.raw()) }
    }

    /// Returns the number of slots in this frame.
    #[inline(always)]
    pub fn top(&self) -> i32 {
        self.raw_top() - self.base
    }

    /// Sets the number of slots in this frame.
    ///
    /// Growing the frame fills new slots with `nil`.
    pub fn set_top(&self, top: i32) -> RuntimeResult<()> {
        if top < 0 {
            return Err(RuntimeError::InvalidIndex { index: top });
        }

        let current = self.top();

        if top > current {
            self.ensure((top - current) as usize)?;
        }

        // Safety: The new height is within the frame and the capacity is
        //         reserved.
        unsafe { ffi::lua_settop(self.raw(), self.base + top) }

        Ok(())
    }

    /// Makes sure the stack can grow by `extra` slots.
    ///
    /// Fails with [StackCapacityExceeded](RuntimeError::StackCapacityExceeded)
    /// if the engine cannot provide the requested space.
    pub fn ensure(&self, extra: usize) -> RuntimeResult<()> {
        let requested = match c_int::try_from(extra) {
            Ok(requested) => requested,
            Err(_) => return Err(RuntimeError::StackCapacityExceeded { requested: extra }),
        };

        // Safety: The thread is alive.
        match unsafe { ffi::lua_checkstack(self.raw(), requested) } != 0 {
            true => Ok(()),
            false => Err(RuntimeError::StackCapacityExceeded { requested: extra }),
        }
    }

    /// Removes `count` values from the top of this frame.
    pub fn pop(&self, count: i32) -> RuntimeResult<()> {
        let available = self.top();

        if count < 0 || count > available {
            return Err(RuntimeError::StackUnderflow {
                requested: count,
                available,
            });
        }

        // Safety: The new height is within the frame.
        unsafe { ffi::lua_settop(self.raw(), -count - 1) }

        Ok(())
    }

    /// Removes the slot at `index`, shifting the slots above it down.
    pub fn remove(&self, index: i32) -> RuntimeResult<()> {
        let raw = self.slot_index(index)?;

        // Safety: The index is a valid slot of this frame.
        unsafe {
            ffi::lua_rotate(self.raw(), raw, -1);
            ffi::lua_settop(self.raw(), -2);
        }

        Ok(())
    }

    /// Moves the top value into the slot at `index`, shifting the slots
    /// above it up.
    pub fn insert(&self, index: i32) -> RuntimeResult<()> {
        let raw = self.slot_index(index)?;

        // Safety: The index is a valid slot of this frame.
        unsafe { ffi::lua_rotate(self.raw(), raw, 1) }

        Ok(())
    }

    /// Pops the top value and stores it into the slot at `index`.
    pub fn replace(&self, index: i32) -> RuntimeResult<()> {
        let raw = self.slot_index(index)?;

        if self.top() == 0 {
            return Err(RuntimeError::StackUnderflow {
                requested: 1,
                available: 0,
            });
        }

        // Safety: Both indices are valid slots of this frame.
        unsafe {
            ffi::lua_copy(self.raw(), -1, raw);
            ffi::lua_settop(self.raw(), -2);
        }

        Ok(())
    }

    /// Turns a relative index into an index counted from the bottom of the
    /// frame. Pseudo-indices are returned unchanged.
    pub fn absolute(&self, index: i32) -> RuntimeResult<i32> {
        if is_pseudo(index) {
            return Ok(index);
        }

        let top = self.top();

        let absolute = match index > 0 {
            true => index,
            false => top + 1 + index,
        };

        if index == 0 || absolute < 1 || absolute > top {
            return Err(RuntimeError::InvalidIndex { index });
        }

        Ok(absolute)
    }

    // Resolves an index of this frame into an absolute index of the thread.
    #[inline]
    pub(crate) fn raw_index(&self, index: i32) -> RuntimeResult<c_int> {
        let absolute = self.absolute(index)?;

        match is_pseudo(absolute) {
            true => Ok(absolute),
            false => Ok(self.base + absolute),
        }
    }

    // Same as raw_index, but rejects pseudo-indices.
    #[inline]
    fn slot_index(&self, index: i32) -> RuntimeResult<c_int> {
        if is_pseudo(index) {
            return Err(RuntimeError::InvalidIndex { index });
        }

        self.raw_index(index)
    }

    /// Returns the kind of value at `index`, or [ValueKind::None] if the
    /// index does not address a slot of this frame.
    #[inline]
    pub fn kind(&self, index: i32) -> ValueKind {
        let Ok(raw) = self.raw_index(index) else {
            return ValueKind::None;
        };

        // Safety: The index is valid.
        ValueKind::from_tag(unsafe { ffi::lua_type(self.raw(), raw) })
    }

    /// Returns true if the slot at `index` holds `nil`.
    #[inline(always)]
    pub fn is_nil(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::Nil
    }

    /// Returns true if the slot at `index` holds a boolean.
    #[inline(always)]
    pub fn is_boolean(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::Boolean
    }

    /// Returns true if the slot at `index` holds a number.
    #[inline(always)]
    pub fn is_number(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::Number
    }

    /// Returns true if the slot at `index` holds a number with integer
    /// representation.
    #[inline]
    pub fn is_integer(&self, index: i32) -> bool {
        let Ok(raw) = self.raw_index(index) else {
            return false;
        };

        // Safety: The index is valid.
        unsafe { ffi::lua_isinteger(self.raw(), raw) != 0 }
    }

    /// Returns true if the slot at `index` holds a string.
    #[inline(always)]
    pub fn is_string(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::String
    }

    /// Returns true if the slot at `index` holds a table.
    #[inline(always)]
    pub fn is_table(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::Table
    }

    /// Returns true if the slot at `index` can be indexed for reading: it
    /// is a table, or its metatable provides an `__index` function or table.
    pub fn is_table_like(&self, index: i32) -> bool {
        match self.kind(index) {
            ValueKind::None => false,
            ValueKind::Table => true,
            _ => self.has_meta_handler(index, c"__index"),
        }
    }

    // Same as is_table_like, but for writing.
    pub(crate) fn is_table_like_for_write(&self, index: i32) -> bool {
        match self.kind(index) {
            ValueKind::None => false,
            ValueKind::Table => true,
            _ => self.has_meta_handler(index, c"__newindex"),
        }
    }

    /// Returns true if the slot at `index` holds a function.
    #[inline(always)]
    pub fn is_function(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::Function
    }

    /// Returns true if the slot at `index` holds a coroutine.
    #[inline(always)]
    pub fn is_thread(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::Thread
    }

    /// Returns true if the slot at `index` holds a foreign object.
    #[inline(always)]
    pub fn is_user_data(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::UserData
    }

    /// Returns true if the slot at `index` holds a bare pointer.
    #[inline(always)]
    pub fn is_light_user_data(&self, index: i32) -> bool {
        self.kind(index) == ValueKind::LightUserData
    }

    // Returns true if the metatable of the value at `index` has a function or
    // a table under `key`.
    fn has_meta_handler(&self, index: i32, key: &CStr) -> bool {
        let Ok(raw) = self.raw_index(index) else {
            return false;
        };

        if self.ensure(2).is_err() {
            return false;
        }

        // Safety: The index is valid and the capacity is reserved.
        unsafe {
            if ffi::lua_getmetatable(self.raw(), raw) == 0 {
                return false;
            }

            let _ = ffi::lua_pushstring(self.raw(), key.as_ptr());
            let tag = ffi::lua_rawget(self.raw(), -2);
            ffi::lua_settop(self.raw(), -3);

            tag == ffi::LUA_TFUNCTION || tag == ffi::LUA_TTABLE
        }
    }

    /// Returns true if the slots at `a` and `b` hold the same value without
    /// calling meta-methods.
    pub fn same(&self, a: i32, b: i32) -> bool {
        let (Ok(a), Ok(b)) = (self.raw_index(a), self.raw_index(b)) else {
            return false;
        };

        // Safety: Both indices are valid.
        unsafe { ffi::lua_rawequal(self.raw(), a, b) != 0 }
    }

    /// Compares two values with the `==` operator of Lua, calling the `__eq`
    /// meta-method if needed.
    pub fn equal(&self, a: impl IntoStack, b: impl IntoStack) -> RuntimeResult<bool> {
        let guard = StackGuard::new(self);

        self.ensure(1)?;

        // Safety: Capacity reserved.
        unsafe { ffi::lua_pushcclosure(self.raw(), protected_equal, 0) };

        let _ = self.push(a)?;
        let _ = self.push(b)?;

        self.protected_call(2, 1)?;

        // Safety: The call left exactly one result on top.
        let result = unsafe { ffi::lua_toboolean(self.raw(), -1) != 0 };

        drop(guard);

        Ok(result)
    }

    /// Returns a view of the slot at `index`.
    #[inline]
    pub fn object(&self, index: i32) -> RuntimeResult<ObjectView<'_>> {
        Ok(ObjectView::new(self, self.absolute(index)?))
    }

    /// Returns a view of the top slot.
    #[inline(always)]
    pub fn top_object(&self) -> RuntimeResult<ObjectView<'_>> {
        self.object(-1)
    }

    /// Pushes a single value and returns a view of its slot.
    ///
    /// Fails with [MultipleValues](RuntimeError::MultipleValues) if the
    /// conversion pushed anything but one slot. On failure the frame is left
    /// as it was.
    pub fn push(&self, value: impl IntoStack) -> RuntimeResult<ObjectView<'_>> {
        let guard = StackGuard::new(self);

        value.push_into(self)?;

        let pushed = self.raw_top() - guard.raw_top();

        if pushed != 1 {
            return Err(RuntimeError::MultipleValues { pushed });
        }

        guard.release();

        Ok(ObjectView::new(self, self.top()))
    }

    /// Pushes any number of values and returns how many slots were pushed.
    pub fn push_multi(&self, values: impl PushMulti) -> RuntimeResult<i32> {
        let guard = StackGuard::new(self);

        let count = values.push_multi(self)?;

        guard.release();

        Ok(count)
    }

    /// Pushes `nil`.
    #[inline(always)]
    pub fn push_nil(&self) -> RuntimeResult<ObjectView<'_>> {
        self.ensure(1)?;

        // Safety: Capacity reserved.
        unsafe { ffi::lua_pushnil(self.raw()) };

        Ok(ObjectView::new(self, self.top()))
    }

    /// Pushes a new empty table.
    #[inline(always)]
    pub fn push_table(&self) -> RuntimeResult<TableView<'_>> {
        self.push_table_with_capacity(0, 0)
    }

    /// Pushes a new empty table with preallocated space for `array` sequence
    /// items and `records` keyed items.
    pub fn push_table_with_capacity(
        &self,
        array: usize,
        records: usize,
    ) -> RuntimeResult<TableView<'_>> {
        self.ensure(1)?;

        let array = c_int::try_from(array).unwrap_or(c_int::MAX);
        let records = c_int::try_from(records).unwrap_or(c_int::MAX);

        // Safety: Capacity reserved.
        unsafe { ffi::lua_createtable(self.raw(), array, records) };

        Ok(TableView::new_unchecked(ObjectView::new(self, self.top())))
    }

    /// Pushes the table of global variables.
    pub fn globals(&self) -> RuntimeResult<TableView<'_>> {
        self.ensure(1)?;

        // Safety: Capacity reserved.
        let _ = unsafe {
            ffi::lua_rawgeti(
                self.raw(),
                ffi::LUA_REGISTRYINDEX,
                ffi::LUA_RIDX_GLOBALS as ffi::lua_Integer,
            )
        };

        Ok(TableView::new_unchecked(ObjectView::new(self, self.top())))
    }

    /// Returns a view of the engine's registry table. The registry is
    /// addressed by a pseudo-index and does not occupy a slot.
    #[inline(always)]
    pub fn registry(&self) -> TableView<'_> {
        TableView::new_unchecked(ObjectView::new(self, ffi::LUA_REGISTRYINDEX))
    }

    /// Starts an index path rooted in the table of global variables.
    #[inline(always)]
    pub fn global<'s>(&'s self, key: impl Into<crate::runtime::PathKey<'s>>) -> TableIndexPath<'s> {
        TableIndexPath::globals(self).at(key)
    }

    /// Stores the value at `index` as a persistent [Reference].
    #[inline(always)]
    pub fn store(&self, index: i32) -> RuntimeResult<Reference> {
        self.object(index)?.store()
    }

    /// Compiles a chunk of Lua code and pushes it as a function.
    ///
    /// Precompiled chunks are rejected unless the engine was configured with
    /// [allow_bytecode](crate::runtime::StateConfig::allow_bytecode).
    pub fn load(
        &self,
        source: impl AsRef<[u8]>,
        chunk_name: &str,
    ) -> RuntimeResult<FunctionView<'_>> {
        let source = source.as_ref();

        let name = match CString::new(format!("={chunk_name}")) {
            Ok(name) => name,
            Err(_) => {
                return Err(RuntimeError::Syntax {
                    message: String::from("chunk name contains a zero byte"),
                })
            }
        };

        let mode = match self.engine().config.allow_bytecode {
            true => c"bt",
            false => c"t",
        };

        self.ensure(1)?;

        // Safety: The buffer and the strings outlive the call.
        let status = unsafe {
            ffi::luaL_loadbufferx(
                self.raw(),
                source.as_ptr() as *const c_char,
                source.len(),
                name.as_ptr(),
                mode.as_ptr(),
            )
        };

        if status != ffi::LUA_OK {
            return Err(self.pop_error(status));
        }

        Ok(FunctionView::new_unchecked(ObjectView::new(self, self.top())))
    }

    /// Compiles and runs a chunk of Lua code, converting its results into
    /// `R`.
    pub fn execute<'s, R: PullMulti<'s>>(&'s self, source: impl AsRef<[u8]>) -> RuntimeResult<R> {
        let guard = StackGuard::new(self);

        let function = self.load(source, "chunk")?.index();
        let result = finish_call::<R>(self, function, 0)?;

        guard.release();

        Ok(result)
    }

    /// Converts values starting at `position`, advancing it past the slots
    /// the conversion kept on the stack.
    #[inline(always)]
    pub fn pull<'s, T: PullMulti<'s>>(&'s self, position: &mut i32) -> RuntimeResult<T> {
        T::pull_multi(self, position)
    }

    /// Tests whether the values starting at `position` can be converted into
    /// `T` without converting them.
    #[inline(always)]
    pub fn probe<'s, T: PullMulti<'s>>(&'s self, position: i32) -> bool {
        let mut position = position;

        T::probe_multi(self, &mut position)
    }

    /// Runs a full garbage collection cycle.
    #[inline(always)]
    pub fn collect_garbage(&self) {
        // Safety: The thread is alive.
        let _ = unsafe { ffi::lua_gc(self.raw(), ffi::LUA_GCCOLLECT, 0) };
    }

    /// Opens a nested frame on top of this one.
    ///
    /// Views of this frame cannot be pushed into the nested frame directly,
    /// use a [Reference] to move values between frames.
    pub fn with_stack<R>(&self, f: impl FnOnce(&Stack) -> R) -> R {
        let frame = Stack::open(self.state, self.engine);
        let guard = StackGuard::new(&frame);

        let result = f(&frame);

        drop(guard);

        result
    }

    /// Creates a new coroutine and pushes it.
    pub fn push_thread(&self) -> RuntimeResult<ObjectView<'_>> {
        self.ensure(1)?;

        // Safety: Capacity reserved.
        let _ = unsafe { ffi::lua_newthread(self.raw()) };

        Ok(ObjectView::new(self, self.top()))
    }

    // Calls the function below `arguments` values in protected mode.
    pub(crate) fn protected_call(&self, arguments: c_int, results: c_int) -> RuntimeResult<()> {
        // Safety: The callee and the arguments are on top of the stack.
        let status = unsafe { ffi::lua_pcall(self.raw(), arguments, results, 0) };

        match status == ffi::LUA_OK {
            true => Ok(()),
            false => Err(self.pop_error(status)),
        }
    }

    // Replaces the key on top of the stack with `table[key]`.
    pub(crate) fn protected_get(&self, table: c_int) -> RuntimeResult<()> {
        self.ensure(2)?;

        // Safety: Capacity reserved, the key is on top.
        unsafe {
            ffi::lua_pushcclosure(self.raw(), protected_get, 0);
            ffi::lua_pushvalue(self.raw(), table);
            ffi::lua_rotate(self.raw(), -3, 2);
        }

        self.protected_call(2, 1)
    }

    // Pops the key and the value on top of the stack and assigns
    // `table[key] = value`.
    pub(crate) fn protected_set(&self, table: c_int) -> RuntimeResult<()> {
        self.ensure(2)?;

        // Safety: Capacity reserved, the key and the value are on top.
        unsafe {
            ffi::lua_pushcclosure(self.raw(), protected_set, 0);
            ffi::lua_pushvalue(self.raw(), table);
            ffi::lua_rotate(self.raw(), -4, 2);
        }

        self.protected_call(3, 0)
    }

    // Replaces the value on top of the stack with its length.
    pub(crate) fn protected_len(&self) -> RuntimeResult<()> {
        self.ensure(1)?;

        // Safety: Capacity reserved, the value is on top.
        unsafe {
            ffi::lua_pushcclosure(self.raw(), protected_len, 0);
            ffi::lua_rotate(self.raw(), -2, 1);
        }

        self.protected_call(1, 1)
    }

    pub(crate) fn pop_error(&self, status: c_int) -> RuntimeError {
        // Safety: A failed engine call leaves the error object on top.
        let message = unsafe { error_message(self.raw(), -1) };

        // Safety: Same as above.
        unsafe { ffi::lua_settop(self.raw(), -2) };

        RuntimeError::from_status(status, message)
    }
}

// Restores the height of a frame when dropped, unless released.
pub(crate) struct StackGuard<'s> {
    stack: &'s Stack,
    top: c_int,
    armed: bool,
}

impl<'s> Drop for StackGuard<'s> {
    #[inline]
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        // Safety: The guarded height is not above the current height.
        unsafe { ffi::lua_settop(self.stack.raw(), self.top) }
    }
}

impl<'s> StackGuard<'s> {
    #[inline(always)]
    pub(crate) fn new(stack: &'s Stack) -> Self {
        Self {
            stack,
            top: stack.raw_top(),
            armed: true,
        }
    }

    #[inline(always)]
    pub(crate) fn raw_top(&self) -> c_int {
        self.top
    }

    #[inline(always)]
    pub(crate) fn release(mut self) {
        self.armed = false;
    }
}

#[inline(always)]
pub(crate) fn is_pseudo(index: c_int) -> bool {
    index <= ffi::LUA_REGISTRYINDEX
}

// Safety: `index` is a valid index of `state`.
pub(crate) unsafe fn error_message(state: *mut ffi::lua_State, index: c_int) -> String {
    match ffi::lua_type(state, index) {
        ffi::LUA_TSTRING | ffi::LUA_TNUMBER => {
            let mut length = 0;
            let data = ffi::lua_tolstring(state, index, &mut length);

            match data.is_null() {
                true => String::new(),
                false => {
                    let bytes = std::slice::from_raw_parts(data as *const u8, length);

                    String::from_utf8_lossy(bytes).into_owned()
                }
            }
        }

        tag => format!(
            "(error object is a {} value)",
            ValueKind::from_tag(tag).name()
        ),
    }
}

unsafe extern "C-unwind" fn protected_get(state: *mut ffi::lua_State) -> c_int {
    let _ = ffi::lua_gettable(state, 1);

    1
}

unsafe extern "C-unwind" fn protected_set(state: *mut ffi::lua_State) -> c_int {
    ffi::lua_settable(state, 1);

    0
}

unsafe extern "C-unwind" fn protected_len(state: *mut ffi::lua_State) -> c_int {
    ffi::lua_len(state, 1);

    1
}

unsafe extern "C-unwind" fn protected_equal(state: *mut ffi::lua_State) -> c_int {
    let equal = ffi::lua_compare(state, 1, 2, ffi::LUA_OPEQ);

    ffi::lua_pushboolean(state, equal);

    1
}

#[cfg(test)]
mod tests {
    use crate::runtime::{RuntimeError, State, ValueKind};

    #[test]
    fn test_push_and_pop() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let _ = stack.push(true).unwrap();
            let _ = stack.push(2).unwrap();
            let _ = stack.push_nil().unwrap();
            let _ = stack.push(0.4).unwrap();
            let _ = stack.push("5").unwrap();
            let _ = stack.push_table().unwrap();

            assert_eq!(stack.top(), 6);
            assert!(stack.is_table(-1));
            assert!(stack.is_string(-2));
            assert!(stack.is_number(-3));
            assert!(stack.is_nil(-4));
            assert!(stack.is_integer(-5));
            assert!(stack.is_boolean(-6));

            stack.pop(1).unwrap();
            assert_eq!(stack.top(), 5);
            assert!(stack.is_string(-1));

            stack.pop(5).unwrap();
            assert_eq!(stack.top(), 0);

            assert_eq!(
                stack.pop(1),
                Err(RuntimeError::StackUnderflow {
                    requested: 1,
                    available: 0,
                }),
            );
        });
    }

    #[test]
    fn test_remove() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let _ = stack.push(true).unwrap();
            let _ = stack.push(2).unwrap();
            let _ = stack.push_nil().unwrap();

            stack.remove(1).unwrap();
            assert_eq!(stack.top(), 2);
            assert!(stack.is_nil(-1));
            assert!(stack.is_number(-2));

            stack.remove(2).unwrap();
            assert_eq!(stack.top(), 1);
            assert!(stack.is_number(-1));

            assert!(stack.remove(2).is_err());
            assert_eq!(stack.top(), 1);
        });
    }

    #[test]
    fn test_absolute_index() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let _ = stack.push(true).unwrap();
            let _ = stack.push(2).unwrap();
            let _ = stack.push_nil().unwrap();

            assert_eq!(stack.absolute(-1).unwrap(), stack.top());
            assert_eq!(stack.absolute(-2).unwrap(), 2);
            assert_eq!(stack.absolute(-3).unwrap(), 1);
            assert!(stack.absolute(-4).is_err());
            assert!(stack.absolute(0).is_err());
            assert!(stack.absolute(4).is_err());

            let registry = mlua_sys::LUA_REGISTRYINDEX;

            assert_eq!(stack.absolute(registry).unwrap(), registry);
        });
    }

    #[test]
    fn test_frame_cannot_reach_below_base() {
        let state = State::new().unwrap();

        state.with_stack(|outer| {
            let _ = outer.push(1).unwrap();

            outer.with_stack(|inner| {
                assert_eq!(inner.top(), 0);
                assert_eq!(inner.kind(-1), ValueKind::None);
                assert!(inner.pop(1).is_err());

                let _ = inner.push("inner").unwrap();
                assert_eq!(inner.top(), 1);
            });

            assert_eq!(outer.top(), 1);
            assert!(outer.is_number(1));
        });
    }

    #[test]
    fn test_replace_and_insert() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let a = stack.push(1).unwrap();
            let _ = stack.push(2).unwrap();
            let c = stack.push(3).unwrap();

            let _ = stack.push(c).unwrap();
            stack.replace(a.index()).unwrap();

            assert_eq!(stack.top(), 3);
            assert_eq!(a.get::<i32>().unwrap(), 3);

            let _ = stack.push(10).unwrap();
            stack.insert(1).unwrap();

            assert_eq!(stack.top(), 4);
            assert_eq!(stack.object(1).unwrap().get::<i32>().unwrap(), 10);
            assert_eq!(stack.object(2).unwrap().get::<i32>().unwrap(), 3);
        });
    }

    #[test]
    fn test_compare_values() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let a = stack.push(1).unwrap();
            let b = stack.push(3).unwrap();

            assert!(!stack.same(-1, -2));
            assert_eq!(stack.same(-1, -2), stack.equal(a, b).unwrap());
            assert!(stack.equal(123, 123).unwrap());
            assert_eq!(stack.top(), 2);
        });
    }

    #[test]
    fn test_ensure_capacity() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            stack.ensure(10_000).unwrap();

            assert_eq!(
                stack.ensure(2_000_000),
                Err(RuntimeError::StackCapacityExceeded {
                    requested: 2_000_000,
                }),
            );

            assert!(stack.ensure(usize::MAX).is_err());
        });
    }
}
