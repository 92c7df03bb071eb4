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
    cell::RefCell,
    ffi::c_void,
    fmt::{Debug, Formatter},
    ptr::NonNull,
    rc::{Rc, Weak},
};

use log::info;
use mlua_sys as ffi;

use crate::{
    report::{system_panic, STATE_LOG},
    runtime::{
        borrow::BorrowTable,
        ty::TypeRegistry,
        RuntimeError,
        RuntimeResult,
        Stack,
        StackGuard,
    },
};

/// A general configuration object for the Lua [State].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[non_exhaustive]
pub struct StateConfig {
    /// If set to true, the standard Lua libraries (`base`, `coroutine`,
    /// `table`, `string`, `math`, `utf8`, `io`, `os`, `debug`, `package`) are
    /// opened when the engine is created.
    ///
    /// The default value is true.
    pub standard_libraries: bool,

    /// The number of free slots reserved when a new frame is opened by
    /// [State::with_stack].
    ///
    /// The default value is 20.
    pub stack_reserve: usize,

    /// If set to true, [Stack::load] accepts precompiled Lua chunks.
    /// Otherwise, only source text is accepted.
    ///
    /// The default value is false.
    pub allow_bytecode: bool,
}

impl Default for StateConfig {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}

impl StateConfig {
    /// The default constructor for this configuration object.
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            standard_libraries: true,
            stack_reserve: 20,
            allow_bytecode: false,
        }
    }

    /// Sets the [standard_libraries](Self::standard_libraries) flag.
    #[inline(always)]
    pub const fn with_standard_libraries(mut self, enabled: bool) -> Self {
        self.standard_libraries = enabled;
        self
    }

    /// Sets the [stack_reserve](Self::stack_reserve) value.
    #[inline(always)]
    pub const fn with_stack_reserve(mut self, slots: usize) -> Self {
        self.stack_reserve = slots;
        self
    }

    /// Sets the [allow_bytecode](Self::allow_bytecode) flag.
    #[inline(always)]
    pub const fn with_bytecode(mut self, allowed: bool) -> Self {
        self.allow_bytecode = allowed;
        self
    }
}

/// An instance of the Lua engine.
///
/// The State owns the engine's main thread. All value exchange happens
/// inside the stack frames opened by [with_stack](Self::with_stack).
///
/// When the State is dropped, the engine is closed and the finalizers of all
/// remaining foreign objects run. Persistent references that outlive the
/// State become inert.
pub struct State {
    engine: Rc<Engine>,
}

impl Debug for State {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("State")
            .field("config", &self.engine.config)
            .finish_non_exhaustive()
    }
}

impl State {
    /// Creates a new engine with the default configuration.
    #[inline(always)]
    pub fn new() -> RuntimeResult<Self> {
        Self::with_config(StateConfig::new())
    }

    /// Creates a new engine with the specified configuration.
    pub fn with_config(config: StateConfig) -> RuntimeResult<Self> {
        // Safety: Plain constructor call.
        let main = unsafe { ffi::luaL_newstate() };

        let Some(main) = NonNull::new(main) else {
            return Err(RuntimeError::OutOfMemory);
        };

        if config.standard_libraries {
            // Safety: The state has just been created.
            unsafe { ffi::luaL_openlibs(main.as_ptr()) };
        }

        let engine = Rc::new_cyclic(|this| Engine {
            main,
            this: this.clone(),
            types: RefCell::new(TypeRegistry::default()),
            borrows: BorrowTable::default(),
            config,
        });

        // Safety: The registry always has room for one entry on a fresh
        //         state.
        unsafe {
            ffi::lua_pushlightuserdata(main.as_ptr(), Rc::as_ptr(&engine) as *mut c_void);
            ffi::lua_rawsetp(main.as_ptr(), ffi::LUA_REGISTRYINDEX, engine_key());
        }

        info!(target: STATE_LOG, "Lua engine created.");

        Ok(Self { engine })
    }

    /// Returns the configuration this engine was created with.
    #[inline(always)]
    pub fn config(&self) -> &StateConfig {
        &self.engine.config
    }

    /// Opens a new frame on the main thread and runs `f` with it.
    ///
    /// The frame is closed when `f` returns, restoring the height of the
    /// stack. Frames may nest: calling `with_stack` again inside `f` opens
    /// a frame above the current one.
    pub fn with_stack<R>(&self, f: impl FnOnce(&Stack) -> R) -> R {
        let stack = Stack::open(self.engine.main, NonNull::from(self.engine.as_ref()));
        let guard = StackGuard::new(&stack);

        // The reserve is a hint, the frame still checks every push.
        let _ = stack.ensure(self.engine.config.stack_reserve);

        let result = f(&stack);

        drop(guard);

        result
    }

    /// Runs a full garbage collection cycle.
    #[inline(always)]
    pub fn collect_garbage(&self) {
        self.with_stack(|stack| stack.collect_garbage())
    }
}

pub(crate) struct Engine {
    main: NonNull<ffi::lua_State>,
    this: Weak<Engine>,
    pub(crate) types: RefCell<TypeRegistry>,
    pub(crate) borrows: BorrowTable,
    pub(crate) config: StateConfig,
}

impl Drop for Engine {
    fn drop(&mut self) {
        // Descriptors hold registry slots that die together with the state.
        self.types.get_mut().clear();

        // Safety: The engine exclusively owns the main thread.
        unsafe {
            // Finalizers running during close must not reach the engine.
            ffi::lua_pushnil(self.main.as_ptr());
            ffi::lua_rawsetp(self.main.as_ptr(), ffi::LUA_REGISTRYINDEX, engine_key());

            ffi::lua_close(self.main.as_ptr());
        }

        info!(target: STATE_LOG, "Lua engine closed.");
    }
}

impl Engine {
    // Safety: `state` is a live thread of an engine created by State.
    pub(crate) unsafe fn lookup(state: *mut ffi::lua_State) -> NonNull<Engine> {
        match Self::find(state) {
            Some(engine) => engine,
            None => system_panic!("Lua state without engine data."),
        }
    }

    // Same as lookup, but returns None while the engine is closing.
    //
    // Safety: `state` is a live thread of an engine created by State.
    pub(crate) unsafe fn find(state: *mut ffi::lua_State) -> Option<NonNull<Engine>> {
        let _ = ffi::lua_rawgetp(state, ffi::LUA_REGISTRYINDEX, engine_key());
        let engine = ffi::lua_touserdata(state, -1) as *mut Engine;
        ffi::lua_settop(state, -2);

        NonNull::new(engine)
    }

    #[inline(always)]
    pub(crate) fn main(&self) -> NonNull<ffi::lua_State> {
        self.main
    }

    #[inline(always)]
    pub(crate) fn weak(&self) -> Weak<Engine> {
        self.this.clone()
    }
}

static ENGINE_KEY: u8 = 0;

#[inline(always)]
fn engine_key() -> *const c_void {
    &ENGINE_KEY as *const u8 as *const c_void
}

#[cfg(test)]
mod tests {
    use crate::runtime::{State, StateConfig};

    #[test]
    fn test_globals_exist() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let globals = stack.globals().unwrap();

            assert!(globals.as_object().is_table());
            assert_eq!(stack.top(), 1);
        });
    }

    #[test]
    fn test_nested_frames() {
        let state = State::new().unwrap();

        state.with_stack(|outer| {
            let _ = outer.push(true).unwrap();
            assert_eq!(outer.top(), 1);

            let mut nested = false;

            state.with_stack(|inner| {
                nested = true;

                let _ = inner.push_nil().unwrap();
                assert_eq!(inner.top(), 1);
            });

            assert!(nested);
            assert_eq!(outer.top(), 1);
        });
    }

    #[test]
    fn test_without_libraries() {
        let state = State::with_config(StateConfig::new().with_standard_libraries(false)).unwrap();

        state.with_stack(|stack| {
            assert!(stack.global("print").get::<Option<String>>().unwrap().is_none());
            assert!(stack.execute::<()>("return math.min(1, 2)").is_err());
            assert_eq!(stack.top(), 0);
        });
    }

    #[test]
    fn test_bytecode_is_rejected() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let chunk = b"\x1bLua\x54\x00";

            assert!(stack.load(chunk, "binary").is_err());
            assert_eq!(stack.top(), 0);
        });
    }
}
