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
    fmt::{Debug, Formatter},
};

use ahash::AHashMap;

use crate::{
    report::debug_unreachable,
    runtime::{RuntimeError, RuntimeResult},
};

const BORROW_LIMIT: u32 = 64;

// Tracks the Rust references to foreign objects that host callbacks hold
// while they run. The key is the object's address.
#[derive(Default)]
pub(crate) struct BorrowTable {
    objects: RefCell<AHashMap<usize, BorrowState>>,
}

impl Debug for BorrowTable {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        let objects = self.objects.borrow();

        formatter
            .debug_struct("BorrowTable")
            .field("objects", &objects.len())
            .finish()
    }
}

#[derive(Clone, Copy, Debug)]
enum BorrowState {
    Shared(u32),
    Exclusive,
}

impl BorrowTable {
    pub(crate) fn grant_ref(
        &self,
        address: usize,
        type_name: &'static str,
    ) -> RuntimeResult<BorrowGuard<'_>> {
        let mut objects = self.objects.borrow_mut();

        match objects.get_mut(&address) {
            None => {
                let _ = objects.insert(address, BorrowState::Shared(1));
            }

            Some(BorrowState::Shared(count)) => {
                if *count >= BORROW_LIMIT {
                    return Err(RuntimeError::BorrowLimit { type_name });
                }

                *count += 1;
            }

            Some(BorrowState::Exclusive) => {
                return Err(RuntimeError::WriteToRead { type_name });
            }
        }

        Ok(BorrowGuard {
            table: self,
            address,
        })
    }

    pub(crate) fn grant_mut(
        &self,
        address: usize,
        type_name: &'static str,
    ) -> RuntimeResult<BorrowGuard<'_>> {
        let mut objects = self.objects.borrow_mut();

        match objects.get(&address) {
            None => {
                let _ = objects.insert(address, BorrowState::Exclusive);
            }

            Some(BorrowState::Shared(_)) => {
                return Err(RuntimeError::ReadToWrite { type_name });
            }

            Some(BorrowState::Exclusive) => {
                return Err(RuntimeError::WriteToWrite { type_name });
            }
        }

        Ok(BorrowGuard {
            table: self,
            address,
        })
    }

    // Returns true if the object is not borrowed by any running callback.
    pub(crate) fn is_free(&self, address: usize) -> bool {
        !self.objects.borrow().contains_key(&address)
    }

    fn release(&self, address: usize) {
        let mut objects = self.objects.borrow_mut();

        match objects.get_mut(&address) {
            Some(BorrowState::Shared(count)) if *count > 1 => *count -= 1,

            Some(_) => {
                let _ = objects.remove(&address);
            }

            // Safety: Guards are created by successful grants only.
            None => unsafe { debug_unreachable!("Releasing unknown borrow.") },
        }
    }
}

pub(crate) struct BorrowGuard<'a> {
    table: &'a BorrowTable,
    address: usize,
}

impl<'a> Drop for BorrowGuard<'a> {
    #[inline(always)]
    fn drop(&mut self) {
        self.table.release(self.address);
    }
}
