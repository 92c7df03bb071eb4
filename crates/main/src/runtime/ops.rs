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

//! Meta-method keys of foreign objects.
//!
//! The keys are the exact meta-method names Lua itself uses, so handlers
//! installed through the [UserTypeBuilder](crate::runtime::UserTypeBuilder)
//! interoperate with metatables created by Lua code.

use std::fmt::{Display, Formatter};

use crate::runtime::{IntoStack, RuntimeResult, Stack};

/// A meta-method of a Lua metatable.
///
/// ```
/// use ad_astra_lua::runtime::ops::MetaMethod;
///
/// assert_eq!(MetaMethod::Add.name(), "__add");
/// assert_eq!(MetaMethod::from_name("__tostring"), Some(MetaMethod::ToString));
/// assert_eq!(MetaMethod::from_name("add"), None);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
#[non_exhaustive]
pub enum MetaMethod {
    /// An addition operator: `lhs + rhs`.
    Add,

    /// A subtraction operator: `lhs - rhs`.
    Sub,

    /// A multiplication operator: `lhs * rhs`.
    Mul,

    /// A division operator: `lhs / rhs`.
    Div,

    /// A modulo operator: `lhs % rhs`.
    Mod,

    /// An exponentiation operator: `lhs ^ rhs`.
    Pow,

    /// A unary minus operator: `-value`.
    Unm,

    /// A floor division operator: `lhs // rhs`.
    IDiv,

    /// A bitwise conjunction: `lhs & rhs`.
    BAnd,

    /// A bitwise disjunction: `lhs | rhs`.
    BOr,

    /// A bitwise exclusive disjunction: `lhs ~ rhs`.
    BXor,

    /// A left shift: `lhs << rhs`.
    Shl,

    /// A right shift: `lhs >> rhs`.
    Shr,

    /// A bitwise negation: `~value`.
    BNot,

    /// A concatenation operator: `lhs .. rhs`.
    Concat,

    /// A length operator: `#value`.
    Len,

    /// An equality operator: `lhs == rhs`.
    Eq,

    /// A less-than operator: `lhs < rhs`.
    Lt,

    /// A less-or-equal operator: `lhs <= rhs`.
    Le,

    /// An invocation: `value(...)`.
    Call,

    /// A finalizer.
    ///
    /// Foreign objects reserve this key for their destructors.
    Gc,

    /// A field read: `value.key`.
    Index,

    /// A field write: `value.key = x`.
    NewIndex,

    /// A value returned by `getmetatable`, which also blocks `setmetatable`.
    Metatable,

    /// A string conversion performed by `tostring`.
    ToString,

    /// A type name used by the engine's error messages.
    Name,

    /// A to-be-closed variable exit.
    Close,

    /// An iteration performed by `pairs`.
    Pairs,
}

impl Display for MetaMethod {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.name())
    }
}

impl IntoStack for MetaMethod {
    #[inline(always)]
    fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
        self.name().push_into(stack)
    }
}

impl MetaMethod {
    /// The list of all meta-methods.
    pub const ALL: [Self; 28] = [
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Div,
        Self::Mod,
        Self::Pow,
        Self::Unm,
        Self::IDiv,
        Self::BAnd,
        Self::BOr,
        Self::BXor,
        Self::Shl,
        Self::Shr,
        Self::BNot,
        Self::Concat,
        Self::Len,
        Self::Eq,
        Self::Lt,
        Self::Le,
        Self::Call,
        Self::Gc,
        Self::Index,
        Self::NewIndex,
        Self::Metatable,
        Self::ToString,
        Self::Name,
        Self::Close,
        Self::Pairs,
    ];

    /// Returns the metatable key of this meta-method.
    #[inline]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Add => "__add",
            Self::Sub => "__sub",
            Self::Mul => "__mul",
            Self::Div => "__div",
            Self::Mod => "__mod",
            Self::Pow => "__pow",
            Self::Unm => "__unm",
            Self::IDiv => "__idiv",
            Self::BAnd => "__band",
            Self::BOr => "__bor",
            Self::BXor => "__bxor",
            Self::Shl => "__shl",
            Self::Shr => "__shr",
            Self::BNot => "__bnot",
            Self::Concat => "__concat",
            Self::Len => "__len",
            Self::Eq => "__eq",
            Self::Lt => "__lt",
            Self::Le => "__le",
            Self::Call => "__call",
            Self::Gc => "__gc",
            Self::Index => "__index",
            Self::NewIndex => "__newindex",
            Self::Metatable => "__metatable",
            Self::ToString => "__tostring",
            Self::Name => "__name",
            Self::Close => "__close",
            Self::Pairs => "__pairs",
        }
    }

    /// Looks up a meta-method by its metatable key.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|method| method.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::ops::MetaMethod;

    #[test]
    fn test_names_are_unique() {
        for method in MetaMethod::ALL {
            assert_eq!(MetaMethod::from_name(method.name()), Some(method));
        }
    }
}
