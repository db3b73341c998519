// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text post-processing for recognised page text.

pub mod normalize;

pub use normalize::TextNormalizer;
