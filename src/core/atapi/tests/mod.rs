// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 itsakeyfut

//! Unit tests for the ATAPI engine organized by category

mod commands;
pub(crate) mod helpers;
mod transfer;
