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
    cell::Cell,
    mem::{align_of, size_of},
    ptr::addr_of_mut,
    rc::Rc,
};

use ad_astra_lua::{
    runtime::{
        ops::MetaMethod,
        pointer_storage_size,
        value_storage_size,
        Callback,
        FunctionRef,
        FunctionView,
        RuntimeError,
        State,
        UserType as _,
    },
    ScriptEnum,
    UserPtr,
    UserType,
    UserValue,
};

#[derive(UserType, Debug, Clone, PartialEq)]
struct Point {
    x: i64,
    y: i64,
}

#[derive(UserType)]
#[user_type(name = "Shape")]
struct Shape {
    sides: i64,
}

#[derive(UserType)]
struct Square {
    #[base]
    shape: Shape,
    size: f64,
}

#[derive(ScriptEnum, Debug, Clone, Copy, PartialEq)]
enum Direction {
    North = 1,
    East = 2,
    South = 3,
    West = 4,
}

#[derive(UserType)]
struct Holder {
    data: Vec<u64>,
}

struct Tracked(Rc<Cell<usize>>);

impl ad_astra_lua::runtime::UserType for Tracked {}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.0.set(self.0.get() + 1);
    }
}

// Installs a global `collect(object)` that calls the `__gc` meta-method of
// the object's own metatable on `object`, or on `target` when provided.
fn install_collector(stack: &ad_astra_lua::runtime::Stack) {
    stack
        .global("collect")
        .set(Callback::raw(|stack| {
            let object = stack.object(1)?;

            let Some(metatable) = object.metatable()? else {
                return Ok(0);
            };

            let finalizer = metatable.raw_get::<FunctionView>("__gc")?;

            match stack.top() > 1 {
                true => finalizer.invoke::<()>(stack.object(2)?)?,
                false => finalizer.invoke::<()>(object)?,
            }

            Ok(0)
        }))
        .unwrap();
}

fn register_point(stack: &ad_astra_lua::runtime::Stack) {
    let ty = stack.create_user_type::<Point>("Point").unwrap();

    ty.set_read_only_property("x", |this: &Point| this.x).unwrap();

    ty.set_property(
        "y",
        |this: &Point| this.y,
        |this: &mut Point, value: i64| this.y = value,
    )
    .unwrap();

    ty.set_write_only_property("reset", |this: &mut Point, value: i64| {
        this.x = value;
        this.y = value;
    })
    .unwrap();

    ty.set_method("sum", |this: &Point| this.x + this.y).unwrap();

    ty.set_method("shift", |this: &mut Point, dx: i64, dy: i64| {
        this.x += dx;
        this.y += dy;
    })
    .unwrap();

    ty.set_meta(MetaMethod::ToString, |this: UserPtr<Point>| {
        // Safety: The object is alive for the duration of the call.
        let this = unsafe { this.as_ref() };

        format!("Point({}, {})", this.x, this.y)
    })
    .unwrap();
}

#[test]
fn test_point_storage() {
    let state = State::new().unwrap();

    state.with_stack(|stack| {
        register_point(stack);

        let point = stack.push(Point { x: 1, y: 2 }).unwrap();

        assert_eq!(point.user_data_len().unwrap(), value_storage_size::<Point>());
        assert_eq!(
            value_storage_size::<Point>(),
            size_of::<usize>() + size_of::<Point>() + align_of::<Point>() - 1,
        );

        let mut other = Point { x: 10, y: 20 };

        // Safety: `other` outlives the engine-side object.
        let borrowed = unsafe { stack.push_pointer(&mut other) }.unwrap();

        assert_eq!(borrowed.user_data_len().unwrap(), pointer_storage_size());
        assert_eq!(pointer_storage_size(), size_of::<usize>());
        assert!(borrowed.is_user_type::<Point>());
        assert_eq!(
            borrowed.user_ptr::<Point>().unwrap().as_ptr(),
            addr_of_mut!(other),
        );

        stack.pop(1).unwrap();
    });
}

#[test]
fn test_point_properties() {
    let state = State::new().unwrap();

    state.with_stack(|stack| {
        register_point(stack);

        let point = stack.push(Point { x: 1, y: 2 }).unwrap();

        stack.global("p").set(point).unwrap();

        assert_eq!(stack.execute::<i64>("return p.x").unwrap(), 1);
        assert_eq!(stack.execute::<i64>("p.y = 7; return p.y").unwrap(), 7);

        assert_eq!(
            stack.execute::<()>("p.x = 5").unwrap_err().to_string(),
            "chunk:1: field 'x' of user type 'Point' is read-only",
        );

        assert_eq!(
            stack.execute::<()>("p.z = 5").unwrap_err().to_string(),
            "chunk:1: cannot assign field 'z' of user type 'Point'",
        );

        assert_eq!(
            stack.execute::<()>("return p.reset").unwrap_err().to_string(),
            "chunk:1: field 'reset' of user type 'Point' is write-only",
        );

        assert_eq!(stack.execute::<Option<i64>>("return p.z").unwrap(), None);

        let mut ptr = point.user_ptr::<Point>().unwrap();

        // Safety: No other borrow of the object exists.
        unsafe { ptr.as_mut().x = 42 };

        assert_eq!(stack.execute::<i64>("return p.x").unwrap(), 42);

        stack.execute::<()>("p.reset = 3").unwrap();

        assert_eq!(point.with_user(|this: &Point| this.clone()).unwrap(), Point { x: 3, y: 3 });
        assert_eq!(stack.top(), 1);
    });
}

#[test]
fn test_point_methods() {
    let state = State::new().unwrap();

    state.with_stack(|stack| {
        register_point(stack);

        stack.global("p").set(Point { x: 1, y: 2 }).unwrap();

        assert_eq!(stack.execute::<i64>("return p:sum()").unwrap(), 3);
        assert_eq!(stack.execute::<i64>("p:shift(10, 20); return p:sum()").unwrap(), 33);
        assert_eq!(stack.execute::<String>("return tostring(p)").unwrap(), "Point(11, 22)");

        assert_eq!(
            stack.global("p").at("sum").invoke_method::<i64>(()).unwrap(),
            33,
        );

        assert!(stack.execute::<()>("p.sum(1)").is_err());
        assert_eq!(stack.top(), 0);
    });
}

#[test]
fn test_reserved_meta_method() {
    let state = State::new().unwrap();

    state.with_stack(|stack| {
        let ty = stack.create_user_type::<Point>("Point").unwrap();

        assert!(matches!(
            ty.set("__gc", 1),
            Err(RuntimeError::ReservedMetaMethod { key: "__gc" }),
        ));

        assert!(matches!(
            ty.set_meta(MetaMethod::Gc, || ()),
            Err(RuntimeError::ReservedMetaMethod { key: "__gc" }),
        ));

        assert!(matches!(
            stack.create_user_type::<Point>("Point"),
            Err(RuntimeError::DuplicateUserType { .. }),
        ));
    });
}

#[test]
fn test_derived_bases() {
    assert_eq!(Shape::type_name(), "Shape");

    let state = State::new().unwrap();

    state.with_stack(|stack| {
        let square = stack
            .push(Square {
                shape: Shape { sides: 4 },
                size: 2.5,
            })
            .unwrap();

        assert!(square.is_user_type::<Square>());
        assert!(!square.is_user_type::<Shape>());

        let shape = square.user_ptr::<Shape>().unwrap();
        let this = square.user_ptr::<Square>().unwrap();

        // Safety: The pointers address a live object.
        unsafe {
            assert_eq!(shape.as_ref().sides, 4);
            assert_eq!(this.as_ref().size, 2.5);
            assert_eq!(
                shape.as_ptr(),
                addr_of_mut!((*this.as_ptr()).shape),
            );
        }

        stack
            .global("sides")
            .set(stack.push_function(|shape: UserPtr<Shape>| {
                // Safety: The object is alive for the duration of the call.
                unsafe { shape.as_ref().sides }
            }).unwrap())
            .unwrap();

        stack.global("square").set(square).unwrap();

        assert_eq!(stack.execute::<i64>("return sides(square)").unwrap(), 4);

        assert_eq!(
            stack.execute::<()>("sides(1)").unwrap_err().to_string(),
            "chunk:1: bad argument #1 (Shape expected, got number)",
        );
    });
}

#[test]
fn test_script_enum() {
    let state = State::new().unwrap();

    state.with_stack(|stack| {
        stack.global("direction").set(Direction::South).unwrap();

        assert_eq!(stack.execute::<i64>("return direction").unwrap(), 3);
        assert_eq!(
            stack.global("direction").get::<Direction>().unwrap(),
            Direction::South,
        );
        assert_eq!(stack.execute::<Direction>("return 4").unwrap(), Direction::West);
        assert_eq!(stack.execute::<Direction>("return 1").unwrap(), Direction::North);

        assert!(stack.execute::<Direction>("return 5").is_err());
        assert!(stack.execute::<Direction>("return 2.5").is_err());
        assert!(stack.execute::<Direction>("return 'East'").is_err());
        assert_eq!(
            stack.execute::<Either2>("return 2").unwrap(),
            Either2::Left(Direction::East),
        );
        assert_eq!(stack.top(), 0);
    });
}

type Either2 = ad_astra_lua::Either<Direction, String>;

#[test]
fn test_user_value() {
    let state = State::new().unwrap();

    state.with_stack(|stack| {
        stack.create_user_type::<Point>("Point").unwrap();

        stack.global("p").set(UserValue(Point { x: 5, y: 6 })).unwrap();

        let copy = stack.global("p").get::<UserValue<Point>>().unwrap();

        assert_eq!(copy.x, 5);
        assert_eq!(*copy, Point { x: 5, y: 6 });

        assert_eq!(
            stack.execute::<UserValue<Point>>("return 1").unwrap_err(),
            RuntimeError::TypeMismatch {
                expected: "Point".into(),
                found: ad_astra_lua::runtime::ValueKind::Number,
            },
        );
    });
}

#[test]
fn test_finalizer_runs_once() {
    let dropped = Rc::new(Cell::new(0));

    let state = State::new().unwrap();

    state.with_stack(|stack| {
        let object = stack.push_value(Tracked(dropped.clone())).unwrap();

        object.finalize().unwrap();
        object.finalize().unwrap();

        assert_eq!(dropped.get(), 1);

        assert!(matches!(
            object.with_user(|_: &Tracked| ()),
            Err(RuntimeError::ObjectDestroyed { .. }),
        ));

        let _ = stack.push_value(Tracked(dropped.clone())).unwrap();
    });

    assert_eq!(dropped.get(), 1);

    drop(state);

    assert_eq!(dropped.get(), 2);
}

#[test]
fn test_garbage_collection() {
    let dropped = Rc::new(Cell::new(0));

    let state = State::new().unwrap();

    state.with_stack(|stack| {
        for _ in 0..10 {
            let _ = stack.push_value(Tracked(dropped.clone())).unwrap();
        }

        stack.set_top(0).unwrap();
        stack.collect_garbage();
    });

    assert_eq!(dropped.get(), 10);
}

#[test]
fn test_finalizer_checks_type() {
    let dropped = Rc::new(Cell::new(0));

    let state = State::new().unwrap();

    state.with_stack(|stack| {
        install_collector(stack);

        let tracked = stack.push_value(Tracked(dropped.clone())).unwrap();
        let holder = stack.push(Holder { data: vec![1, 2, 3] }).unwrap();

        stack.global("a").set(tracked).unwrap();
        stack.global("h").set(holder).unwrap();

        assert_eq!(
            stack.execute::<String>("return getmetatable(a)").unwrap(),
            Tracked::type_name(),
        );

        assert!(stack.execute::<()>("getmetatable(a).__gc(h)").is_err());

        stack.execute::<()>("collect(a, h)").unwrap();

        assert_eq!(
            holder.with_user(|holder: &Holder| holder.data.clone()).unwrap(),
            vec![1, 2, 3],
        );

        assert_eq!(dropped.get(), 0);

        stack.execute::<()>("collect(a)").unwrap();

        assert_eq!(dropped.get(), 1);

        assert!(matches!(
            tracked.with_user(|_: &Tracked| ()),
            Err(RuntimeError::ObjectDestroyed { .. }),
        ));
    });
}

#[test]
fn test_finalizer_respects_borrows() {
    let dropped = Rc::new(Cell::new(0));

    let state = State::new().unwrap();

    state.with_stack(|stack| {
        install_collector(stack);

        let ty = stack.create_user_type::<Tracked>("Tracked").unwrap();

        ty.set_method("run", |_: &Tracked, callback: FunctionRef| {
            callback.invoke::<()>(())
        })
        .unwrap();

        let object = stack.push_value(Tracked(dropped.clone())).unwrap();

        stack.global("obj").set(object).unwrap();

        let error = stack
            .execute::<()>("obj:run(function() collect(obj) end)")
            .unwrap_err();

        assert!(error
            .to_string()
            .contains("cannot borrow object of type userdata mutably"));

        assert_eq!(dropped.get(), 0);
        assert!(object.with_user(|_: &Tracked| ()).is_ok());

        stack.execute::<()>("collect(obj)").unwrap();

        assert_eq!(dropped.get(), 1);
    });
}
