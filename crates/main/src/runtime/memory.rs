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
    any::type_name,
    ffi::{c_int, c_void},
    mem::{align_of, size_of, transmute},
    panic::{catch_unwind, AssertUnwindSafe},
    ptr::{drop_in_place, null_mut, NonNull},
};

use log::error;
use mlua_sys as ffi;

use crate::{
    report::TYPES_LOG,
    runtime::{
        invoke::protect,
        state::Engine,
        ty::TypeRegistry,
        ObjectView,
        RuntimeError,
        RuntimeResult,
        Stack,
        StackGuard,
        TableView,
        UserType,
    },
};

// The size of the leading "live" pointer of every foreign object storage.
pub(crate) const LIVE_SIZE: usize = size_of::<*mut u8>();

/// Returns the size in bytes of the engine-side storage of a foreign
/// object of type `T` pushed by value: the leading pointer slot, followed
/// by the object and the room for its alignment padding.
#[inline(always)]
pub const fn value_storage_size<T>() -> usize {
    let object = size_of::<T>() + align_of::<T>() - 1;

    LIVE_SIZE
        + match object > 0 {
            true => object,
            false => 1,
        }
}

/// Returns the size in bytes of the engine-side storage of a foreign
/// object pushed by pointer.
#[inline(always)]
pub const fn pointer_storage_size() -> usize {
    LIVE_SIZE
}

// Safety: `object` points to a live instance of `T` that is never used
//         again.
unsafe fn drop_object<T>(object: *mut u8) {
    drop_in_place(object as *mut T)
}

// Pushes the `__gc` meta-method for the objects of type `T` that use
// `metatable`.
pub(crate) fn push_finalizer<'s, T: UserType>(
    stack: &'s Stack,
    metatable: &TableView<'_>,
) -> RuntimeResult<ObjectView<'s>> {
    let raw = metatable.raw_index()?;

    stack.ensure(3)?;

    let destructor: unsafe fn(*mut u8) = drop_object::<T>;

    // Safety: Capacity reserved, the metatable index is valid.
    unsafe {
        ffi::lua_pushlightuserdata(stack.raw(), destructor as *mut c_void);
        ffi::lua_pushvalue(stack.raw(), raw);
        ffi::lua_pushcclosure(stack.raw(), finalize_object, 2);
    }

    Ok(ObjectView::new(stack, stack.top()))
}

// The shared `__gc` meta-method of all foreign objects.
//
// Upvalues: the object's destructor, the metatable of the object's type.
// Values with any other metatable are ignored.
unsafe extern "C-unwind" fn finalize_object(state: *mut ffi::lua_State) -> c_int {
    let data = ffi::lua_touserdata(state, 1) as *mut *mut u8;

    if data.is_null() || ffi::lua_rawlen(state, 1) <= LIVE_SIZE {
        return 0;
    }

    if ffi::lua_getmetatable(state, 1) == 0 {
        return 0;
    }

    let own = ffi::lua_rawequal(state, -1, ffi::lua_upvalueindex(2)) != 0;

    ffi::lua_settop(state, -2);

    if !own {
        return 0;
    }

    let live = *data;

    if live.is_null() {
        return 0;
    }

    // No host function runs while the engine is closing.
    if let Some(engine) = Engine::find(state) {
        // Safety: The engine outlives every call into its threads.
        match engine.as_ref().borrows.grant_mut(live as usize, "userdata") {
            Ok(guard) => drop(guard),
            Err(error) => return protect(state, move |_| Err(error)),
        }
    }

    // The object is marked dead before it is destroyed, so a re-entrant
    // finalization sees it as already finalized.
    *data = null_mut();

    let destructor = ffi::lua_touserdata(state, ffi::lua_upvalueindex(1));

    if destructor.is_null() {
        return 0;
    }

    // Safety: The upvalue is set by push_finalizer.
    let destructor = transmute::<*mut c_void, unsafe fn(*mut u8)>(destructor);

    if catch_unwind(AssertUnwindSafe(|| destructor(live))).is_err() {
        error!(target: TYPES_LOG, "Foreign object destructor panicked.");
    }

    0
}

// Safety: The value at `index` is a foreign object storage.
#[inline(always)]
pub(crate) unsafe fn live_pointer(state: *mut ffi::lua_State, index: c_int) -> *mut u8 {
    let data = ffi::lua_touserdata(state, index) as *mut *mut u8;

    match data.is_null() {
        true => null_mut(),
        false => *data,
    }
}

impl Stack {
    /// Pushes `value` as a foreign object owned by the engine.
    ///
    /// The object is dropped when the engine collects it, when it is
    /// [finalized](ObjectView::finalize) explicitly, or when the engine is
    /// closed.
    #[inline(always)]
    pub fn push_value<T: UserType>(&self, value: T) -> RuntimeResult<ObjectView<'_>> {
        self.push_with(|| Ok(value))
    }

    /// Allocates the storage of a foreign object of type `T` and constructs
    /// the object in place with `construct`.
    ///
    /// If `construct` fails, the storage is popped and the error is
    /// returned.
    pub fn push_with<T: UserType>(
        &self,
        construct: impl FnOnce() -> RuntimeResult<T>,
    ) -> RuntimeResult<ObjectView<'_>> {
        TypeRegistry::describe::<T>(self)?;

        self.ensure(2)?;

        let guard = StackGuard::new(self);
        let size = value_storage_size::<T>();

        // Safety: Capacity reserved.
        let data = unsafe { ffi::lua_newuserdatauv(self.raw(), size, 0) } as *mut u8;

        // Safety: The engine aligns user data for any pointer-sized value.
        unsafe { (data as *mut *mut u8).write(null_mut()) };

        // Safety: The storage is larger than the live pointer.
        let start = unsafe { data.add(LIVE_SIZE) };
        let offset = start.align_offset(align_of::<T>());

        if offset == usize::MAX || LIVE_SIZE + offset + size_of::<T>() > size {
            return Err(RuntimeError::AlignmentFailure {
                type_name: type_name::<T>(),
            });
        }

        let value = construct()?;

        // Safety: The address is aligned and lies within the storage.
        unsafe {
            let object = start.add(offset);

            (object as *mut T).write(value);
            (data as *mut *mut u8).write(object);
        }

        TypeRegistry::push_metatable::<T>(self)?;

        // Safety: The storage is below its metatable.
        let _ = unsafe { ffi::lua_setmetatable(self.raw(), -2) };

        guard.release();

        Ok(ObjectView::new(self, self.top()))
    }

    /// Pushes a foreign object that points to `object` without owning it.
    ///
    /// The engine never drops the pointee.
    ///
    /// # Safety
    ///
    /// The pointee must outlive every use of the pushed value by the
    /// engine, and must not be accessed by Rust code while host functions
    /// use it.
    pub unsafe fn push_pointer<T: UserType>(
        &self,
        object: &mut T,
    ) -> RuntimeResult<ObjectView<'_>> {
        self.push_raw_pointer(NonNull::from(object))
    }

    // Safety: Same as push_pointer.
    pub(crate) unsafe fn push_raw_pointer<T: UserType>(
        &self,
        object: NonNull<T>,
    ) -> RuntimeResult<ObjectView<'_>> {
        TypeRegistry::describe::<T>(self)?;

        self.ensure(2)?;

        let guard = StackGuard::new(self);

        let data = ffi::lua_newuserdatauv(self.raw(), pointer_storage_size(), 0) as *mut *mut u8;

        data.write(object.as_ptr() as *mut u8);

        TypeRegistry::push_metatable::<T>(self)?;

        let _ = ffi::lua_setmetatable(self.raw(), -2);

        guard.release();

        Ok(ObjectView::new(self, self.top()))
    }
}

impl<'s> ObjectView<'s> {
    /// Runs the finalizer of the viewed foreign object, dropping the object
    /// if the engine owns it.
    ///
    /// Finalizing an object twice, or finalizing an object pushed by
    /// pointer, does nothing. Fails if a running host function borrows the
    /// object.
    pub fn finalize(&self) -> RuntimeResult<()> {
        self.expect(crate::runtime::ValueKind::UserData)?;

        let stack = self.stack();
        let raw = self.raw_index()?;

        // Safety: The index holds user data.
        let live = unsafe { live_pointer(stack.raw(), raw) };

        if live.is_null() {
            return Ok(());
        }

        if !stack.engine().borrows.is_free(live as usize) {
            return Err(RuntimeError::ReadToWrite {
                type_name: "userdata",
            });
        }

        let guard = StackGuard::new(stack);

        stack.ensure(2)?;

        // Safety: Capacity reserved, the index is valid.
        let found = unsafe { ffi::luaL_getmetafield(stack.raw(), raw, c"__gc".as_ptr()) };

        if found == ffi::LUA_TNIL {
            return Ok(());
        }

        // Safety: The meta-method is on top.
        unsafe { ffi::lua_pushvalue(stack.raw(), raw) };

        stack.protected_call(1, 0)?;

        drop(guard);

        Ok(())
    }
}
