use catalog_types::CatalogError;

/// One element of a bulk operation's answer, in input order. The REST
/// collaborator turns these into its response envelope; the CLI prints them
/// directly.
#[derive(Debug)]
pub struct EntryResult<T> {
    /// The reference as the caller wrote it.
    pub reference: String,
    pub outcome: Result<T, CatalogError>,
}

impl<T> EntryResult<T> {
    pub fn ok(reference: String, value: T) -> Self {
        Self {
            reference,
            outcome: Ok(value),
        }
    }

    pub fn err(reference: String, error: CatalogError) -> Self {
        Self {
            reference,
            outcome: Err(error),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    /// The single-sentence error string for the envelope, empty on success.
    pub fn error_msg(&self) -> String {
        match &self.outcome {
            Ok(_) => String::new(),
            Err(err) => err.envelope_message(),
        }
    }
}
