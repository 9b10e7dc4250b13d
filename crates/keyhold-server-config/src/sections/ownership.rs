// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Which ownership mechanism counts for buildings and villas.
//!
//! Resolved once at startup and handed to the scope calculator, so the
//! choice is never re-made per query.

use keyhold_server_auth::{OwnershipConfig, OwnershipSource};
use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OwnershipConfigLayer {
	#[serde(default)]
	pub buildings: Option<OwnershipSource>,
	#[serde(default)]
	pub villas: Option<OwnershipSource>,
}

impl OwnershipConfigLayer {
	pub fn merge(&mut self, other: OwnershipConfigLayer) {
		if other.buildings.is_some() {
			self.buildings = other.buildings;
		}
		if other.villas.is_some() {
			self.villas = other.villas;
		}
	}

	/// Unset families default to [`OwnershipSource::Both`].
	pub fn finalize(self) -> OwnershipConfig {
		OwnershipConfig {
			buildings: self.buildings.unwrap_or_default(),
			villas: self.villas.unwrap_or_default(),
		}
	}
}
