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

use proc_macro2::Span;
use syn::{spanned::Spanned, Attribute, Error, Field, LitStr, Meta, Result};

// Options of the `#[user_type(...)]` and `#[script_enum(...)]` attributes.
#[derive(Default)]
pub struct TypeOptions {
    pub name: Option<LitStr>,
}

impl TypeOptions {
    pub fn parse(attributes: &[Attribute], key: &str) -> Result<Self> {
        let mut options = Self::default();

        for attribute in attributes {
            if !attribute.path().is_ident(key) {
                continue;
            }

            attribute.parse_nested_meta(|meta| {
                if meta.path.is_ident("name") {
                    let name = meta.value()?.parse::<LitStr>()?;

                    if name.value().is_empty() {
                        return Err(Error::new(name.span(), "Type name cannot be empty."));
                    }

                    if options.name.is_some() {
                        return Err(Error::new(name.span(), "Duplicate name option."));
                    }

                    options.name = Some(name);

                    return Ok(());
                }

                Err(meta.error("Unknown option. Expected \"name = <string>\"."))
            })?;
        }

        Ok(options)
    }
}

// Returns the span of the `#[base]` attribute of the field, if any.
pub fn base_attribute(field: &Field) -> Result<Option<Span>> {
    let mut result = None;

    for attribute in &field.attrs {
        if !attribute.path().is_ident("base") {
            continue;
        }

        let Meta::Path(_) = &attribute.meta else {
            return Err(Error::new(
                attribute.meta.span(),
                "The base attribute does not have options.",
            ));
        };

        if result.is_some() {
            return Err(Error::new(attribute.span(), "Duplicate base attribute."));
        }

        result = Some(attribute.span());
    }

    Ok(result)
}
