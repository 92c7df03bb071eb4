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

use proc_macro2::TokenStream;
use quote::{quote, quote_spanned};
use syn::{
    parse::{Parse, ParseStream},
    spanned::Spanned,
    Data,
    DeriveInput,
    Error,
    Fields,
    Result,
};

use crate::utils::{Facade, TypeOptions};

pub struct ScriptEnumDerive(TokenStream);

impl Parse for ScriptEnumDerive {
    fn parse(input: ParseStream) -> Result<Self> {
        let item = input.parse::<DeriveInput>()?;

        let options = TypeOptions::parse(&item.attrs, "script_enum")?;

        let data = match &item.data {
            Data::Enum(data) => data,

            Data::Struct(data) => {
                return Err(Error::new(
                    data.struct_token.span,
                    "ScriptEnum can only be derived for enum types.",
                ));
            }

            Data::Union(data) => {
                return Err(Error::new(
                    data.union_token.span,
                    "ScriptEnum can only be derived for enum types.",
                ));
            }
        };

        if !item.generics.params.is_empty() {
            return Err(Error::new(
                item.generics.span(),
                "ScriptEnum cannot be derived for generic types.",
            ));
        }

        if data.variants.is_empty() {
            return Err(Error::new(
                item.ident.span(),
                "ScriptEnum requires at least one variant.",
            ));
        }

        for variant in &data.variants {
            match &variant.fields {
                Fields::Unit => (),

                fields => {
                    return Err(Error::new(
                        fields.span(),
                        "ScriptEnum variants cannot have fields.",
                    ));
                }
            }
        }

        let span = item.ident.span();
        let ident = &item.ident;
        let runtime = ident.face_runtime();
        let intrinsics = ident.face_intrinsics();
        let result = ident.face_result();
        let cow = ident.face_cow();

        let name = match &options.name {
            Some(name) => quote!(#name),

            None => {
                let name = ident.to_string();

                quote_spanned!(span=> #name)
            }
        };

        let variants = data
            .variants
            .iter()
            .map(|variant| &variant.ident)
            .collect::<Vec<_>>();

        Ok(Self(quote_spanned!(span=>
            impl #runtime::IntoStack for #ident {
                #[inline(always)]
                fn push_into(self, stack: &#runtime::Stack) -> #runtime::RuntimeResult<()> {
                    #runtime::IntoStack::push_into(self as i64, stack)
                }
            }

            impl<'s> #runtime::FromObject<'s> for #ident {
                #[inline(always)]
                fn hint() -> #cow<'static, str> {
                    #cow::Borrowed(#name)
                }

                fn probe(object: &#runtime::ObjectView<'s>) -> bool {
                    match #intrinsics::enum_discriminant::<Self>(object) {
                        #result::Ok(value) => #( value == (Self::#variants as i64) )||*,
                        #result::Err(_) => false,
                    }
                }

                fn from_object(object: #runtime::ObjectView<'s>) -> #runtime::RuntimeResult<Self> {
                    let value = #intrinsics::enum_discriminant::<Self>(&object)?;

                    #(
                    if value == (Self::#variants as i64) {
                        return #result::Ok(Self::#variants);
                    }
                    )*

                    #result::Err(#intrinsics::enum_mismatch::<Self>(&object))
                }
            }
        )))
    }
}

impl From<ScriptEnumDerive> for proc_macro::TokenStream {
    #[inline(always)]
    fn from(value: ScriptEnumDerive) -> Self {
        value.0.into()
    }
}
