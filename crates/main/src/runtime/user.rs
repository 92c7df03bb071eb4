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
    any::TypeId,
    ffi::c_int,
    fmt::{Debug, Formatter},
    marker::PhantomData,
};

use mlua_sys as ffi;

use crate::{
    runtime::{
        invoke::protect,
        ops::MetaMethod,
        ty::{TypeRegistry, UserTypeDescriptor},
        Callback,
        FromObject,
        HostFunction,
        IntoStack,
        ObjectView,
        PullMulti,
        PushMulti,
        RuntimeError,
        RuntimeResult,
        Stack,
        StackGuard,
        TableRef,
        TableView,
        UserType,
        ValueKind,
    },
    UserPtr,
};

/// A handle to the descriptor of a [UserType] that installs properties,
/// methods, and meta-methods of the type.
///
/// The handle is returned by [Stack::create_user_type] and
/// [Stack::user_type]. Everything installed through the builder is shared
/// by all foreign objects of the type in the engine, including the objects
/// pushed before the installation.
///
/// Field reads on a foreign object are resolved in the following order:
///
/// 1. A property getter.
/// 2. An entry of the flat property table (methods, functions, and values
///    installed with [set](Self::set)).
/// 3. The raw `__index` hook installed with [set](Self::set).
///
/// Field writes are resolved through the property setters, and then
/// through the raw `__newindex` hook. Writing a field that has neither of
/// them raises a Lua error naming the field and the type.
///
/// ```
/// use ad_astra_lua::runtime::{State, UserType};
///
/// struct Counter {
///     value: i64,
/// }
///
/// impl UserType for Counter {}
///
/// let state = State::new().unwrap();
///
/// state.with_stack(|stack| {
///     let ty = stack.create_user_type::<Counter>("Counter").unwrap();
///
///     ty.set_read_only_property("value", |this: &Counter| this.value)
///         .unwrap();
///
///     ty.set_method("increment", |this: &mut Counter, step: i64| {
///             this.value += step;
///         })
///         .unwrap();
///
///     let counter = stack.push_value(Counter { value: 1 }).unwrap();
///
///     stack.global("counter").set(counter).unwrap();
///
///     assert_eq!(
///         stack
///             .execute::<i64>("counter:increment(10) return counter.value")
///             .unwrap(),
///         11,
///     );
/// });
/// ```
pub struct UserTypeBuilder<'s, T: UserType> {
    stack: &'s Stack,
    marker: PhantomData<fn(T)>,
}

impl<'s, T: UserType> Debug for UserTypeBuilder<'s, T> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("UserTypeBuilder")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

impl Stack {
    /// Registers the user type `T` under `name` and returns its builder.
    ///
    /// Fails with [DuplicateUserType](RuntimeError::DuplicateUserType) if
    /// the type has already been registered in this engine. The base types
    /// the type declares are described implicitly.
    #[inline]
    pub fn create_user_type<T: UserType>(
        &self,
        name: &str,
    ) -> RuntimeResult<UserTypeBuilder<'_, T>> {
        TypeRegistry::register::<T>(self, name)?;

        Ok(UserTypeBuilder {
            stack: self,
            marker: PhantomData,
        })
    }

    /// Returns the builder of the user type `T`, describing the type under
    /// its default name if the type is not known to this engine yet.
    #[inline]
    pub fn user_type<T: UserType>(&self) -> RuntimeResult<UserTypeBuilder<'_, T>> {
        TypeRegistry::describe::<T>(self)?;

        Ok(UserTypeBuilder {
            stack: self,
            marker: PhantomData,
        })
    }
}

impl<'s, T: UserType> UserTypeBuilder<'s, T> {
    /// Returns the name under which the type is known to Lua.
    pub fn name(&self) -> String {
        let registry = self.stack.engine().types.borrow();

        match registry.get(&TypeId::of::<T>()) {
            Some(descriptor) => descriptor.name.clone(),
            None => String::from(T::type_name()),
        }
    }

    /// Returns true if the type has been registered explicitly.
    pub fn is_registered(&self) -> bool {
        let registry = self.stack.engine().types.borrow();

        match registry.get(&TypeId::of::<T>()) {
            Some(descriptor) => descriptor.registered,
            None => false,
        }
    }

    /// Installs a property with a getter and a setter.
    pub fn set_property<R, V>(
        &self,
        name: &str,
        getter: impl Fn(&T) -> R + 'static,
        setter: impl Fn(&mut T, V) + 'static,
    ) -> RuntimeResult<()>
    where
        R: IntoStack + 'static,
        V: for<'a> FromObject<'a> + 'static,
    {
        self.set_getter(name, getter)?;
        self.set_setter(name, setter)
    }

    /// Installs a property that Lua code can read but cannot assign.
    #[inline(always)]
    pub fn set_read_only_property<R: IntoStack + 'static>(
        &self,
        name: &str,
        getter: impl Fn(&T) -> R + 'static,
    ) -> RuntimeResult<()> {
        self.set_getter(name, getter)
    }

    /// Installs a property that Lua code can assign but cannot read.
    #[inline(always)]
    pub fn set_write_only_property<V>(
        &self,
        name: &str,
        setter: impl Fn(&mut T, V) + 'static,
    ) -> RuntimeResult<()>
    where
        V: for<'a> FromObject<'a> + 'static,
    {
        self.set_setter(name, setter)
    }

    /// Installs a method called with the colon syntax: `object:name(...)`.
    ///
    /// The method is a function of `&T` or `&mut T` followed by up to 6
    /// arguments. The receiver may be an object of `T` or of a type that
    /// declares `T` as its base.
    pub fn set_method<Marker: 'static>(
        &self,
        name: &str,
        method: impl UserMethod<T, Marker>,
    ) -> RuntimeResult<()> {
        let callback = Callback::raw(move |stack| method.call(stack));

        self.with_table(|descriptor| &descriptor.props, |props| props.raw_set(name, callback))
    }

    /// Installs a function called with the dot syntax: `object.name(...)`.
    pub fn set_function<Args: 'static, F: HostFunction<Args>>(
        &self,
        name: &str,
        function: F,
    ) -> RuntimeResult<()> {
        self.with_table(|descriptor| &descriptor.props, |props| {
            props.raw_set(name, Callback::new(function))
        })
    }

    /// Assigns an arbitrary value to a key of the type.
    ///
    /// The `__index` and `__newindex` keys install the raw member access
    /// hooks consulted after the properties. Other meta-method keys go to
    /// the metatable of the type, and the rest of the keys go to the flat
    /// property table.
    ///
    /// The `__gc` key is reserved for the destructor of the type and cannot
    /// be assigned.
    pub fn set(&self, key: &str, value: impl IntoStack) -> RuntimeResult<()> {
        match MetaMethod::from_name(key) {
            Some(MetaMethod::Gc) => Err(RuntimeError::ReservedMetaMethod {
                key: MetaMethod::Gc.name(),
            }),

            Some(MetaMethod::Index | MetaMethod::NewIndex) => {
                self.with_table(|descriptor| &descriptor.hooks, |hooks| hooks.raw_set(key, value))
            }

            Some(_) => self.with_table(
                |descriptor| &descriptor.metatable,
                |metatable| metatable.raw_set(key, value),
            ),

            None => self.with_table(
                |descriptor| &descriptor.props,
                |props| props.raw_set(key, value),
            ),
        }
    }

    /// Installs a host function as a meta-method of the type.
    #[inline(always)]
    pub fn set_meta<Args: 'static, F: HostFunction<Args>>(
        &self,
        method: MetaMethod,
        function: F,
    ) -> RuntimeResult<()> {
        self.set(method.name(), Callback::new(function))
    }

    fn set_getter<R: IntoStack + 'static>(
        &self,
        name: &str,
        getter: impl Fn(&T) -> R + 'static,
    ) -> RuntimeResult<()> {
        let callback = Callback::raw(move |stack| {
            let value = stack.object(1)?.with_user::<T, _>(|this| getter(this))?;

            let _ = stack.push(value)?;

            Ok(1)
        });

        self.with_table(|descriptor| &descriptor.getters, |getters| getters.raw_set(name, callback))
    }

    fn set_setter<V>(&self, name: &str, setter: impl Fn(&mut T, V) + 'static) -> RuntimeResult<()>
    where
        V: for<'a> FromObject<'a> + 'static,
    {
        let callback = Callback::raw(move |stack| {
            let object = stack.object(1)?;

            let mut position = 2;
            let value = stack.pull::<V>(&mut position)?;

            object.with_user_mut::<T, _>(|this| setter(this, value))?;

            Ok(0)
        });

        self.with_table(|descriptor| &descriptor.setters, |setters| setters.raw_set(name, callback))
    }

    // Pushes one of the descriptor's tables and runs `f` with it.
    fn with_table<R>(
        &self,
        select: fn(&UserTypeDescriptor) -> &TableRef,
        f: impl FnOnce(TableView<'s>) -> RuntimeResult<R>,
    ) -> RuntimeResult<R> {
        let guard = StackGuard::new(self.stack);

        let table = {
            let registry = self.stack.engine().types.borrow();

            let Some(descriptor) = registry.get(&TypeId::of::<T>()) else {
                return Err(RuntimeError::TypeMismatch {
                    expected: T::type_name().into(),
                    found: ValueKind::None,
                });
            };

            select(descriptor).push_to(self.stack)?
        };

        let result = f(table);

        drop(guard);

        result
    }
}

/// A marker of the methods that borrow the receiver for reading.
#[derive(Debug)]
pub struct ByRef;

/// A marker of the methods that borrow the receiver mutably.
#[derive(Debug)]
pub struct ByMut;

/// A Rust function that can be installed as a method of the user type `T`.
///
/// The trait is implemented for the `Fn(&T, A1, ..., An) -> R` and
/// `Fn(&mut T, A1, ..., An) -> R` closures with up to 6 arguments following
/// the receiver. The receiver is borrowed for the duration of the call, so
/// a method that re-enters Lua code and reaches the same object through a
/// conflicting borrow fails instead of aliasing it.
pub trait UserMethod<T: UserType, Marker>: 'static {
    /// Converts the receiver and the arguments on the `stack`, calls the
    /// method, and pushes its results. Returns the number of pushed
    /// results.
    fn call(&self, stack: &Stack) -> RuntimeResult<i32>;
}

macro_rules! impl_user_method {
    ($($arg:ident),*) => {
        impl<T, Fun, Ret, $($arg),*> UserMethod<T, (ByRef, $($arg,)*)> for Fun
        where
            T: UserType,
            Fun: Fn(&T, $($arg),*) -> Ret + 'static,
            Ret: PushMulti,
            $($arg: for<'s> PullMulti<'s>,)*
        {
            #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
            fn call(&self, stack: &Stack) -> RuntimeResult<i32> {
                let mut position = 1;
                let this = receiver::<T>(stack, &mut position)?;
                let mut argument = 1;

                $(
                argument += 1;

                let $arg = <$arg as PullMulti<'_>>::pull_multi(stack, &mut position)
                    .map_err(|error| error.at_argument(argument))?;
                )*

                let guard = stack
                    .engine()
                    .borrows
                    .grant_ref(this.address(), T::type_name())?;

                // Safety: The receiver's slot keeps the object alive, and the
                //         borrow is granted.
                let result = (self)(unsafe { this.as_ref() }, $($arg),*);

                drop(guard);

                stack.push_multi(result)
            }
        }

        impl<T, Fun, Ret, $($arg),*> UserMethod<T, (ByMut, $($arg,)*)> for Fun
        where
            T: UserType,
            Fun: Fn(&mut T, $($arg),*) -> Ret + 'static,
            Ret: PushMulti,
            $($arg: for<'s> PullMulti<'s>,)*
        {
            #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
            fn call(&self, stack: &Stack) -> RuntimeResult<i32> {
                let mut position = 1;
                let mut this = receiver::<T>(stack, &mut position)?;
                let mut argument = 1;

                $(
                argument += 1;

                let $arg = <$arg as PullMulti<'_>>::pull_multi(stack, &mut position)
                    .map_err(|error| error.at_argument(argument))?;
                )*

                let guard = stack
                    .engine()
                    .borrows
                    .grant_mut(this.address(), T::type_name())?;

                // Safety: The receiver's slot keeps the object alive, and the
                //         exclusive borrow is granted.
                let result = (self)(unsafe { this.as_mut() }, $($arg),*);

                drop(guard);

                stack.push_multi(result)
            }
        }
    };
}

impl_user_method!();
impl_user_method!(A1);
impl_user_method!(A1, A2);
impl_user_method!(A1, A2, A3);
impl_user_method!(A1, A2, A3, A4);
impl_user_method!(A1, A2, A3, A4, A5);
impl_user_method!(A1, A2, A3, A4, A5, A6);

#[inline]
fn receiver<T: UserType>(stack: &Stack, position: &mut i32) -> RuntimeResult<UserPtr<T>> {
    <UserPtr<T> as PullMulti<'_>>::pull_multi(stack, position).map_err(|error| error.at_argument(1))
}

// Creates the `__index` and `__newindex` meta-methods of a user type.
pub(crate) fn push_dispatchers<'s>(
    stack: &'s Stack,
    getters: &TableRef,
    setters: &TableRef,
    props: &TableRef,
    hooks: &TableRef,
) -> RuntimeResult<(ObjectView<'s>, ObjectView<'s>)> {
    let guard = StackGuard::new(stack);

    let _ = getters.push_to(stack)?;
    let _ = props.push_to(stack)?;
    let _ = hooks.push_to(stack)?;
    let _ = setters.push_to(stack)?;

    // Safety: The upvalues are on top.
    unsafe { ffi::lua_pushcclosure(stack.raw(), dispatch_index, 4) };

    let index = stack.top();

    let _ = getters.push_to(stack)?;
    let _ = setters.push_to(stack)?;
    let _ = hooks.push_to(stack)?;

    // Safety: The upvalues are on top.
    unsafe { ffi::lua_pushcclosure(stack.raw(), dispatch_new_index, 3) };

    let new_index = stack.top();

    guard.release();

    Ok((stack.object(index)?, stack.object(new_index)?))
}

// Upvalues: getters, props, hooks, setters.
unsafe extern "C-unwind" fn dispatch_index(state: *mut ffi::lua_State) -> c_int {
    protect(state, |stack| {
        let object = stack.object(1)?;
        let key = stack.object(2)?;

        let getter = upvalue(stack, 1)?.raw_get::<ObjectView>(key)?;

        if !getter.is_nil() {
            let _ = getter.as_function()?.invoke::<ObjectView>(object)?;

            return Ok(1);
        }

        let value = upvalue(stack, 2)?.raw_get::<ObjectView>(key)?;

        if !value.is_nil() {
            return Ok(1);
        }

        let hook = upvalue(stack, 3)?.raw_get::<ObjectView>(MetaMethod::Index)?;

        match hook.kind() {
            ValueKind::Nil => (),

            ValueKind::Function => {
                let _ = hook.as_function()?.invoke::<ObjectView>((object, key))?;

                return Ok(1);
            }

            _ => {
                let _ = hook.at(key).get::<ObjectView>()?;

                return Ok(1);
            }
        }

        if !upvalue(stack, 4)?.raw_get::<ObjectView>(key)?.is_nil() {
            return Err(RuntimeError::WriteOnlyField {
                field: field_name(&key),
                type_name: type_name(&object),
            });
        }

        let _ = stack.push_nil()?;

        Ok(1)
    })
}

// Upvalues: getters, setters, hooks.
unsafe extern "C-unwind" fn dispatch_new_index(state: *mut ffi::lua_State) -> c_int {
    protect(state, |stack| {
        let object = stack.object(1)?;
        let key = stack.object(2)?;
        let value = stack.object(3)?;

        let setter = upvalue(stack, 2)?.raw_get::<ObjectView>(key)?;

        if !setter.is_nil() {
            setter.as_function()?.call((object, value))?;

            return Ok(0);
        }

        let getter = upvalue(stack, 1)?.raw_get::<ObjectView>(key)?;

        if !getter.is_nil() {
            return Err(RuntimeError::ReadOnlyField {
                field: field_name(&key),
                type_name: type_name(&object),
            });
        }

        let hook = upvalue(stack, 3)?.raw_get::<ObjectView>(MetaMethod::NewIndex)?;

        match hook.kind() {
            ValueKind::Nil => Err(RuntimeError::UnknownField {
                field: field_name(&key),
                type_name: type_name(&object),
            }),

            ValueKind::Function => {
                hook.as_function()?.call((object, key, value))?;

                Ok(0)
            }

            _ => {
                hook.at(key).set(value)?;

                Ok(0)
            }
        }
    })
}

#[inline(always)]
fn upvalue(stack: &Stack, index: c_int) -> RuntimeResult<TableView<'_>> {
    stack.object(ffi::lua_upvalueindex(index))?.as_table()
}

fn field_name(key: &ObjectView) -> String {
    match key.as_string() {
        Ok(name) => name,
        Err(_) => key.to_string(),
    }
}

fn type_name(object: &ObjectView) -> String {
    let stack = object.stack();
    let guard = StackGuard::new(stack);

    let name = match object.metatable() {
        Ok(Some(metatable)) => metatable.raw_get::<Option<String>>("__name").ok().flatten(),
        _ => None,
    };

    drop(guard);

    name.unwrap_or_else(|| String::from(object.kind().name()))
}
