/// Backend-defined behaviour the suite checks instead of assuming.
#[derive(Clone, Copy, Debug, Default)]
pub struct Capabilities {
    /// `delete_secret(name, None)` removes the highest version rather than
    /// failing with `StoreError::Unsupported`.
    pub delete_latest: bool,
}

impl Capabilities {
    pub const fn with_delete_latest(mut self) -> Self {
        self.delete_latest = true;
        self
    }
}
