// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Host-side services: where files live, how config is kept, and the
// provider factory the host hands to the plugin.

pub mod config_store;
pub mod data_dir;
pub mod host_factory;
