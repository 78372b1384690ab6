// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Repository layer over a vault's system files.
//!
//! Each repository provides typed read-modify-write access to one piece of
//! derived vault state, using a [`super::StorageProvider`] for all I/O.

pub mod history;
pub mod index;

pub use history::{HistoryRange, HistoryRepository};
pub use index::IndexRepository;
