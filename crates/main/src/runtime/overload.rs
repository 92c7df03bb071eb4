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

use std::fmt::{Debug, Formatter};

use crate::runtime::{
    invoke::push_callback,
    Callback,
    HostFunction,
    IntoStack,
    RuntimeError,
    RuntimeResult,
    Stack,
};

/// An ordered set of host functions exposed to Lua as a single function.
///
/// When called, the overload runs the first function whose signature
/// accepts the provided arguments. Signatures are tested by probing the
/// arguments, so the order of the variants matters when more than one of
/// them could accept the same arguments. If none of the variants accepts
/// the arguments, the call fails with
/// [NoMatchingOverload](RuntimeError::NoMatchingOverload).
///
/// ```
/// use ad_astra_lua::runtime::{Overload, State};
///
/// let state = State::new().unwrap();
///
/// state.with_stack(|stack| {
///     let describe = Overload::new()
///         .with(|value: i64| format!("integer {value}"))
///         .with(|value: String| format!("string {value}"))
///         .with(|a: i64, b: i64| format!("pair {a} {b}"));
///
///     stack.global("describe").set(describe).unwrap();
///
///     assert_eq!(stack.execute::<String>("return describe(1)").unwrap(), "integer 1");
///     assert_eq!(stack.execute::<String>("return describe('a')").unwrap(), "string a");
///     assert_eq!(stack.execute::<String>("return describe(1, 2)").unwrap(), "pair 1 2");
/// });
/// ```
#[derive(Default)]
pub struct Overload {
    variants: Vec<Callback>,
}

impl Debug for Overload {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("Overload")
            .field("variants", &self.variants.len())
            .finish()
    }
}

impl IntoStack for Overload {
    fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
        let variants = self.variants;

        let _ = push_callback(
            stack,
            Box::new(move |stack| {
                for variant in &variants {
                    if (variant.probe)(stack) {
                        return (variant.call)(stack);
                    }
                }

                Err(RuntimeError::NoMatchingOverload)
            }),
        )?;

        Ok(())
    }
}

impl Overload {
    /// Creates an overload without variants.
    #[inline(always)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a variant and returns the overload.
    #[inline(always)]
    pub fn with<Args: 'static, F: HostFunction<Args>>(mut self, function: F) -> Self {
        self.add(Callback::new(function));

        self
    }

    /// Appends a variant.
    ///
    /// A variant created with [Callback::raw] accepts any arguments, so the
    /// variants that follow it are never called.
    #[inline(always)]
    pub fn add(&mut self, callback: Callback) {
        self.variants.push(callback);
    }

    /// Returns the number of variants.
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.variants.len()
    }

    /// Returns true if the overload has no variants.
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        runtime::{Overload, State},
        Either,
    };

    #[test]
    fn test_first_match_wins() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let overload = Overload::new()
                .with(|value: f64| format!("number {value}"))
                .with(|value: i64| format!("integer {value}"));

            stack.global("pick").set(overload).unwrap();

            assert_eq!(
                stack.execute::<String>("return pick(3)").unwrap(),
                "number 3"
            );
        });
    }

    #[test]
    fn test_no_matching_overload() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let overload = Overload::new()
                .with(|value: i64| value)
                .with(|value: Either<String, bool>| value.is_left());

            stack.global("pick").set(overload).unwrap();

            assert!(stack.execute::<bool>("return pick(true)").is_ok());
            assert!(stack.execute::<i64>("return pick(1, 2)").is_err());

            let message = stack
                .execute::<String>("local _, e = pcall(pick, {}) return e")
                .unwrap();

            assert_eq!(message, "no matching overload found");
        });
    }
}
