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

use proc_macro2::{Span, TokenStream};
use quote::{quote, quote_spanned};
use syn::{
    parse::{Parse, ParseStream},
    parse_quote,
    spanned::Spanned,
    Data,
    DeriveInput,
    Error,
    Fields,
    Index,
    Member,
    Result,
    Type,
};

use crate::utils::{base_attribute, Facade, TypeOptions};

pub struct UserTypeDerive(TokenStream);

impl Parse for UserTypeDerive {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut item = input.parse::<DeriveInput>()?;

        let options = TypeOptions::parse(&item.attrs, "user_type")?;

        let bases = match &item.data {
            Data::Struct(data) => collect_bases(&data.fields)?,

            Data::Enum(data) => {
                for variant in &data.variants {
                    if let Some(base) = collect_bases(&variant.fields)?.first() {
                        return Err(Error::new(
                            base.span,
                            "Enum variants cannot declare base types.",
                        ));
                    }
                }

                Vec::new()
            }

            Data::Union(data) => {
                return Err(Error::new(
                    data.union_token.span,
                    "Union types cannot be user types.",
                ));
            }
        };

        if let Some(lifetime) = item.generics.lifetimes().next() {
            return Err(Error::new(
                lifetime.span(),
                "User types cannot have lifetime parameters.",
            ));
        }

        for param in item.generics.type_params_mut() {
            param.bounds.push(parse_quote!('static));
        }

        let span = item.ident.span();
        let ident = &item.ident;
        let runtime = ident.face_runtime();
        let intrinsics = ident.face_intrinsics();

        let name = match &options.name {
            Some(name) => quote!(#name),

            None => {
                let name = ident.to_string();

                quote_spanned!(span=> #name)
            }
        };

        let (impl_generics, ty_generics, where_clause) = item.generics.split_for_impl();

        let declare_bases = match bases.is_empty() {
            true => None,

            false => {
                let non_null = ident.face_non_null();
                let addr_of_mut = ident.face_addr_of_mut();

                let declarations = bases.iter().map(|Base { member, ty, span }| {
                    quote_spanned!(*span=>
                        unsafe {
                            bases.add::<#ty>(|this| {
                                #non_null::new_unchecked(#addr_of_mut((*this.as_ptr()).#member))
                            })
                        };
                    )
                });

                Some(quote_spanned!(span=>
                    fn declare_bases(bases: &mut #runtime::BaseList<Self>) {
                        #( #declarations )*
                    }
                ))
            }
        };

        Ok(Self(quote_spanned!(span=>
            impl #impl_generics #runtime::UserType for #ident #ty_generics #where_clause {
                #[inline(always)]
                fn type_name() -> &'static str {
                    #name
                }

                #declare_bases
            }

            impl #impl_generics #runtime::IntoStack for #ident #ty_generics #where_clause {
                #[inline(always)]
                fn push_into(self, stack: &#runtime::Stack) -> #runtime::RuntimeResult<()> {
                    #intrinsics::push_user_value(stack, self)
                }
            }
        )))
    }
}

impl From<UserTypeDerive> for proc_macro::TokenStream {
    #[inline(always)]
    fn from(value: UserTypeDerive) -> Self {
        value.0.into()
    }
}

struct Base {
    member: Member,
    ty: Type,
    span: Span,
}

fn collect_bases(fields: &Fields) -> Result<Vec<Base>> {
    let mut bases = Vec::new();

    for (index, field) in fields.iter().enumerate() {
        let Some(span) = base_attribute(field)? else {
            continue;
        };

        let member = match &field.ident {
            Some(ident) => Member::Named(ident.clone()),

            None => Member::Unnamed(Index {
                index: index as u32,
                span: field.span(),
            }),
        };

        bases.push(Base {
            member,
            ty: field.ty.clone(),
            span,
        });
    }

    Ok(bases)
}
