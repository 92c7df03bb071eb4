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
    any::{type_name, TypeId},
    ffi::c_int,
    fmt::{Debug, Formatter},
    marker::PhantomData,
    ptr::NonNull,
    rc::Rc,
};

use ahash::AHashMap;
use log::debug;
use mlua_sys as ffi;

use crate::{
    report::TYPES_LOG,
    runtime::{
        coercion::mismatch,
        memory::{live_pointer, push_finalizer},
        user::push_dispatchers,
        ObjectView,
        RuntimeError,
        RuntimeResult,
        Stack,
        StackGuard,
        TableRef,
        ValueKind,
    },
    UserPtr,
};

/// A Rust type that can be exposed to Lua as a foreign object.
///
/// Any `'static` type may implement this trait. The default implementation
/// names the type after its Rust name and declares no base types. The
/// [UserType](crate::UserType) derive macro implements this trait with the
/// bases marked by the `#[base]` attribute.
///
/// ```
/// use ad_astra_lua::runtime::{State, UserType};
///
/// struct Counter(usize);
///
/// impl UserType for Counter {
///     fn type_name() -> &'static str {
///         "Counter"
///     }
/// }
///
/// let state = State::new().unwrap();
///
/// state.with_stack(|stack| {
///     let counter = stack.push_value(Counter(5)).unwrap();
///
///     assert!(counter.is_user_data());
/// });
/// ```
pub trait UserType: 'static {
    /// The name of the type used in error messages and as the default
    /// registered name.
    #[inline(always)]
    fn type_name() -> &'static str
    where
        Self: Sized,
    {
        type_name::<Self>()
    }

    /// Declares the base types of this type.
    ///
    /// A pointer to the foreign object of this type is accepted wherever a
    /// pointer to one of its base types is expected.
    #[inline(always)]
    fn declare_bases(bases: &mut BaseList<Self>)
    where
        Self: Sized,
    {
        let _ = bases;
    }
}

pub(crate) type Caster = Rc<dyn Fn(*mut u8) -> *mut u8>;

struct BaseEntry {
    id: TypeId,
    name: &'static str,
    caster: Caster,
    describe: fn(&Stack) -> RuntimeResult<()>,
}

/// A list of the base types of a [UserType].
pub struct BaseList<T> {
    entries: Vec<BaseEntry>,
    marker: PhantomData<fn(NonNull<T>)>,
}

impl<T> Debug for BaseList<T> {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_list()
            .entries(self.entries.iter().map(|entry| entry.name))
            .finish()
    }
}

impl<T: UserType> BaseList<T> {
    #[inline(always)]
    fn new() -> Self {
        Self {
            entries: Vec::new(),
            marker: PhantomData,
        }
    }

    /// Declares `B` as a base type of `T`. The base types of `B` become the
    /// base types of `T` as well.
    ///
    /// # Safety
    ///
    /// The `upcast` function must turn any valid pointer to `T` into a valid
    /// pointer to a `B` that lives inside the same `T` object (e.g. a
    /// pointer to one of its fields).
    pub unsafe fn add<B: UserType>(&mut self, upcast: fn(NonNull<T>) -> NonNull<B>) {
        let caster: Caster = Rc::new(move |pointer| match NonNull::new(pointer as *mut T) {
            Some(pointer) => upcast(pointer).as_ptr() as *mut u8,
            None => pointer,
        });

        self.push(BaseEntry {
            id: TypeId::of::<B>(),
            name: B::type_name(),
            caster: caster.clone(),
            describe: TypeRegistry::describe::<B>,
        });

        let mut nested = BaseList::<B>::new();

        B::declare_bases(&mut nested);

        for entry in nested.entries {
            let outer = caster.clone();
            let inner = entry.caster;

            self.push(BaseEntry {
                id: entry.id,
                name: entry.name,
                caster: Rc::new(move |pointer| inner(outer(pointer))),
                describe: entry.describe,
            });
        }
    }

    /// Returns true if the list contains `B`.
    #[inline]
    pub fn contains<B: UserType>(&self) -> bool {
        let id = TypeId::of::<B>();

        self.entries.iter().any(|entry| entry.id == id)
    }

    fn push(&mut self, entry: BaseEntry) {
        if entry.id == TypeId::of::<T>() || self.entries.iter().any(|known| known.id == entry.id) {
            return;
        }

        self.entries.push(entry);
    }
}

pub(crate) struct UserTypeDescriptor {
    pub(crate) name: String,
    pub(crate) registered: bool,
    pub(crate) metatable: TableRef,
    pub(crate) getters: TableRef,
    pub(crate) setters: TableRef,
    pub(crate) props: TableRef,
    pub(crate) hooks: TableRef,
    derived: Vec<(TypeId, Caster)>,
}

// Per-engine map of the foreign object types.
#[derive(Default)]
pub(crate) struct TypeRegistry {
    types: AHashMap<TypeId, UserTypeDescriptor>,
    by_metatable: AHashMap<usize, TypeId>,
}

impl TypeRegistry {
    #[inline(always)]
    pub(crate) fn clear(&mut self) {
        self.types.clear();
        self.by_metatable.clear();
    }

    #[inline(always)]
    pub(crate) fn get(&self, id: &TypeId) -> Option<&UserTypeDescriptor> {
        self.types.get(id)
    }

    // Creates the implicit descriptor of `T` unless it already exists.
    pub(crate) fn describe<T: UserType>(stack: &Stack) -> RuntimeResult<()> {
        let id = TypeId::of::<T>();

        if stack.engine().types.borrow().types.contains_key(&id) {
            return Ok(());
        }

        let name = T::type_name();
        let guard = StackGuard::new(stack);

        let getters = stack.push_table()?.store_table()?;
        let setters = stack.push_table()?.store_table()?;
        let props = stack.push_table()?.store_table()?;
        let hooks = stack.push_table()?.store_table()?;

        let metatable = stack.push_table()?;

        metatable.raw_set("__name", name)?;
        metatable.raw_set("__metatable", name)?;
        metatable.raw_set("__gc", push_finalizer::<T>(stack, &metatable)?)?;

        let (index, new_index) = push_dispatchers(stack, &getters, &setters, &props, &hooks)?;

        metatable.raw_set("__index", index)?;
        metatable.raw_set("__newindex", new_index)?;

        let address = metatable_address(&metatable)?;
        let metatable = metatable.store_table()?;

        drop(guard);

        let mut bases = BaseList::<T>::new();

        T::declare_bases(&mut bases);

        for entry in &bases.entries {
            (entry.describe)(stack)?;
        }

        let mut registry = stack.engine().types.borrow_mut();

        if registry.types.contains_key(&id) {
            return Ok(());
        }

        for entry in bases.entries {
            if let Some(base) = registry.types.get_mut(&entry.id) {
                base.derived.push((id, entry.caster));
            }
        }

        let _ = registry.by_metatable.insert(address, id);

        let _ = registry.types.insert(
            id,
            UserTypeDescriptor {
                name: String::from(name),
                registered: false,
                metatable,
                getters,
                setters,
                props,
                hooks,
                derived: Vec::new(),
            },
        );

        debug!(target: TYPES_LOG, "User type {name} described.");

        Ok(())
    }

    // Marks the descriptor of `T` as explicitly registered under `name`.
    pub(crate) fn register<T: UserType>(stack: &Stack, name: &str) -> RuntimeResult<()> {
        Self::describe::<T>(stack)?;

        let id = TypeId::of::<T>();

        {
            let mut registry = stack.engine().types.borrow_mut();

            let Some(descriptor) = registry.types.get_mut(&id) else {
                return Err(RuntimeError::TypeMismatch {
                    expected: T::type_name().into(),
                    found: ValueKind::None,
                });
            };

            if descriptor.registered {
                return Err(RuntimeError::DuplicateUserType {
                    type_name: String::from(name),
                });
            }

            descriptor.registered = true;
            descriptor.name = String::from(name);
        }

        let guard = StackGuard::new(stack);

        let metatable = Self::push_metatable::<T>(stack)?.as_table()?;

        metatable.raw_set("__name", name)?;
        metatable.raw_set("__metatable", name)?;

        drop(guard);

        debug!(target: TYPES_LOG, "User type {name} registered.");

        Ok(())
    }

    // Pushes the metatable of `T`, which must be described.
    pub(crate) fn push_metatable<T: UserType>(stack: &Stack) -> RuntimeResult<ObjectView<'_>> {
        let registry = stack.engine().types.borrow();

        match registry.types.get(&TypeId::of::<T>()) {
            Some(descriptor) => Ok(*descriptor.metatable.push_to(stack)?),

            None => Err(RuntimeError::TypeMismatch {
                expected: T::type_name().into(),
                found: ValueKind::None,
            }),
        }
    }

    // Returns the type of the viewed foreign object.
    pub(crate) fn type_of(object: &ObjectView<'_>) -> Option<TypeId> {
        if !object.is_user_data() {
            return None;
        }

        let stack = object.stack();
        let raw = object.raw_index().ok()?;

        stack.ensure(1).ok()?;

        // Safety: Capacity reserved, the index is valid.
        let address = unsafe {
            if ffi::lua_getmetatable(stack.raw(), raw) == 0 {
                return None;
            }

            let address = ffi::lua_topointer(stack.raw(), -1) as usize;

            ffi::lua_settop(stack.raw(), -2);

            address
        };

        stack
            .engine()
            .types
            .borrow()
            .by_metatable
            .get(&address)
            .copied()
    }

    // Returns a caster from `derived` to `T`, if `T` is a declared base of
    // `derived`, or `derived` itself.
    fn caster<T: UserType>(stack: &Stack, derived: TypeId) -> Option<Option<Caster>> {
        let id = TypeId::of::<T>();

        if id == derived {
            return Some(None);
        }

        let registry = stack.engine().types.borrow();

        registry
            .types
            .get(&id)?
            .derived
            .iter()
            .find(|(candidate, _)| *candidate == derived)
            .map(|(_, caster)| Some(caster.clone()))
    }
}

impl<'s> ObjectView<'s> {
    /// Returns true if the viewed value is a foreign object of exactly type
    /// `T`.
    #[inline]
    pub fn is_user_type<T: UserType>(&self) -> bool {
        Self::is_user_type_id(self, TypeId::of::<T>())
    }

    /// Returns a pointer to the viewed foreign object of type `T`.
    ///
    /// The object must be of type `T`, or of a type that declares `T` as
    /// one of its bases.
    #[inline(always)]
    pub fn user_ptr<T: UserType>(&self) -> RuntimeResult<UserPtr<T>> {
        self.get::<UserPtr<T>>()
    }

    /// Runs `f` with a shared reference to the viewed foreign object.
    pub fn with_user<T: UserType, R>(&self, f: impl FnOnce(&T) -> R) -> RuntimeResult<R> {
        let pointer = user_pointer::<T>(self)?;
        let engine = self.stack().engine();
        let guard = engine.borrows.grant_ref(pointer.as_ptr() as usize, T::type_name())?;

        // Safety: The pointer addresses a live object, and the borrow is
        //         granted.
        let result = f(unsafe { pointer.as_ref() });

        drop(guard);

        Ok(result)
    }

    /// Runs `f` with a mutable reference to the viewed foreign object.
    pub fn with_user_mut<T: UserType, R>(&self, f: impl FnOnce(&mut T) -> R) -> RuntimeResult<R> {
        let mut pointer = user_pointer::<T>(self)?;
        let engine = self.stack().engine();
        let guard = engine.borrows.grant_mut(pointer.as_ptr() as usize, T::type_name())?;

        // Safety: The pointer addresses a live object, and the exclusive
        //         borrow is granted.
        let result = f(unsafe { pointer.as_mut() });

        drop(guard);

        Ok(result)
    }

    #[inline]
    fn is_user_type_id(&self, id: TypeId) -> bool {
        TypeRegistry::type_of(self) == Some(id)
    }
}

// Resolves a pointer to `T` stored in the viewed foreign object, upcasting
// it through the declared bases if needed.
pub(crate) fn user_pointer<T: UserType>(object: &ObjectView<'_>) -> RuntimeResult<NonNull<T>> {
    let Some(found) = TypeRegistry::type_of(object) else {
        return Err(mismatch::<UserPtr<T>>(object));
    };

    let Some(caster) = TypeRegistry::caster::<T>(object.stack(), found) else {
        return Err(mismatch::<UserPtr<T>>(object));
    };

    let raw = object.raw_index()?;

    // Safety: The value is a foreign object of a known type.
    let live = unsafe { live_pointer(object.stack().raw(), raw) };

    if live.is_null() {
        return Err(RuntimeError::ObjectDestroyed {
            type_name: T::type_name(),
        });
    }

    let live = match caster {
        Some(caster) => caster(live),
        None => live,
    };

    NonNull::new(live as *mut T).ok_or(RuntimeError::ObjectDestroyed {
        type_name: T::type_name(),
    })
}

// Returns true if `user_pointer` would find a `T` in the viewed object.
pub(crate) fn has_user_pointer<T: UserType>(object: &ObjectView<'_>) -> bool {
    let Some(found) = TypeRegistry::type_of(object) else {
        return false;
    };

    TypeRegistry::caster::<T>(object.stack(), found).is_some()
}

fn metatable_address(metatable: &ObjectView<'_>) -> RuntimeResult<usize> {
    let raw: c_int = metatable.raw_index()?;

    // Safety: The index is valid.
    Ok(unsafe { ffi::lua_topointer(metatable.stack().raw(), raw) } as usize)
}

#[cfg(test)]
mod tests {
    use std::ptr::{addr_of_mut, NonNull};

    use crate::runtime::{BaseList, RuntimeError, State, UserType};

    struct Base {
        value: i64,
    }

    impl UserType for Base {}

    struct Middle {
        _padding: u32,
        base: Base,
    }

    impl UserType for Middle {
        fn declare_bases(bases: &mut BaseList<Self>) {
            // Safety: The field lives inside the object.
            unsafe {
                bases.add::<Base>(|this| {
                    NonNull::new_unchecked(addr_of_mut!((*this.as_ptr()).base))
                })
            }
        }
    }

    struct Derived {
        _tag: u8,
        middle: Middle,
    }

    impl UserType for Derived {
        fn declare_bases(bases: &mut BaseList<Self>) {
            // Safety: The field lives inside the object.
            unsafe {
                bases.add::<Middle>(|this| {
                    NonNull::new_unchecked(addr_of_mut!((*this.as_ptr()).middle))
                })
            }
        }
    }

    struct Unrelated;

    impl UserType for Unrelated {}

    #[test]
    fn test_transitive_upcast() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let object = stack
                .push_value(Derived {
                    _tag: 1,
                    middle: Middle {
                        _padding: 2,
                        base: Base { value: 42 },
                    },
                })
                .unwrap();

            assert!(object.is_user_type::<Derived>());
            assert!(!object.is_user_type::<Base>());

            let derived = object.user_ptr::<Derived>().unwrap();
            let base = object.user_ptr::<Base>().unwrap();

            // Safety: The object is alive.
            unsafe {
                assert_eq!(
                    base.as_ptr(),
                    addr_of_mut!((*derived.as_ptr()).middle.base)
                );
            }

            assert_eq!(object.with_user::<Base, _>(|base| base.value).unwrap(), 42);

            assert!(object.user_ptr::<Middle>().is_ok());
            assert!(object.user_ptr::<Unrelated>().is_err());

            let base_only = stack.push_value(Base { value: 1 }).unwrap();

            assert!(base_only.user_ptr::<Derived>().is_err());
        });
    }

    #[test]
    fn test_duplicate_registration() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let _ = stack.push_value(Unrelated).unwrap();

            stack.create_user_type::<Unrelated>("Unrelated").unwrap();

            assert_eq!(
                stack.create_user_type::<Unrelated>("Unrelated").unwrap_err(),
                RuntimeError::DuplicateUserType {
                    type_name: String::from("Unrelated"),
                }
            );
        });
    }

    #[test]
    fn test_engines_are_independent() {
        let first = State::new().unwrap();
        let second = State::new().unwrap();

        first.with_stack(|stack| stack.create_user_type::<Base>("Base").map(|_| ()).unwrap());
        second.with_stack(|stack| stack.create_user_type::<Base>("Base").map(|_| ()).unwrap());
    }
}
