/// Lock mode a unit of work runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Access {
	/// Write access. Excludes every other unit of work.
	Exclusive,
	/// Read access. May overlap with other shared units, never with an exclusive one.
	Shared,
}

impl Access {
	/// Stable label used in log fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Exclusive => "exclusive",
			Self::Shared => "shared",
		}
	}
}

impl std::fmt::Display for Access {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}
