/// Options controlling how entries land on disk.
#[derive(Clone, Debug)]
pub struct ExtractOptions {
    /// Leading path components removed from every entry.
    pub strip_components: usize,

    /// Apply the archive's permission bits (unix only).
    ///
    /// Default: true
    pub preserve_permissions: bool,

    /// Keep per-entry records in the report. Large snapshots hold millions of
    /// files, so callers that only need totals can turn this off.
    ///
    /// Default: true
    pub record_entries: bool,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            strip_components:     0,
            preserve_permissions: true,
            record_entries:       true,
        }
    }
}

impl ExtractOptions {
    #[must_use]
    pub fn strip_components(mut self, n: usize) -> Self {
        self.strip_components = n;
        self
    }

    #[must_use]
    pub fn preserve_permissions(mut self, preserve: bool) -> Self {
        self.preserve_permissions = preserve;
        self
    }

    #[must_use]
    pub fn record_entries(mut self, record: bool) -> Self {
        self.record_entries = record;
        self
    }
}
