use crate::proxy::RecordProxy;

/// `--duplicate {Original|FirstOnly|LastOnly|Reverse}` (§4.7). Equality of
/// keys is byte-equality of the full encoded key including sentinel and
/// length — exactly `RecordProxy`'s own `PartialEq`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DuplicateDisposition {
    Original,
    FirstOnly,
    LastOnly,
    Reverse,
}

impl std::str::FromStr for DuplicateDisposition {
    type Err = crate::error::CliError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Original" => Ok(DuplicateDisposition::Original),
            "FirstOnly" => Ok(DuplicateDisposition::FirstOnly),
            "LastOnly" => Ok(DuplicateDisposition::LastOnly),
            "Reverse" => Ok(DuplicateDisposition::Reverse),
            other => Err(crate::error::CliError::Config(format!(
                "unknown --duplicate disposition '{}' (expected Original, FirstOnly, LastOnly or Reverse)",
                other
            ))),
        }
    }
}

impl DuplicateDisposition {
    /// Reverse keeps every duplicate (like Original) but publishes the
    /// whole stream in descending key order rather than ascending.
    /// `pipeline::run` does the actual reversing by inverting every
    /// resolved KeyPart's direction (`columns::reverse_key_parts`) before
    /// the `KeyCodec` encodes them; negating the ordinal here is the other
    /// half of that: under the now-descending key, ties within a duplicate
    /// group must still land in descending original-input order, and
    /// `RecordProxy::cmp` breaks key ties by comparing ordinals, so that
    /// comparison has to run backwards too. LastOnly does not need this:
    /// holding and replacing `pending` on each duplicate already keeps the
    /// highest-ordinal (most recent) survivor under the ordinary ascending
    /// order.
    pub fn negates_ordinal(self) -> bool {
        matches!(self, DuplicateDisposition::Reverse)
    }
}

/// Applies duplicate disposition to an already fully-sorted, final-pass
/// stream of proxies (§4.7). Consecutive equal-key proxies are exactly the
/// duplicate groups, since the stream arrives in encoded-key order.
pub struct DuplicateFilter {
    disposition: DuplicateDisposition,
    pending: Option<RecordProxy>,
    dropped: u64,
}

impl DuplicateFilter {
    pub fn new(disposition: DuplicateDisposition) -> Self {
        DuplicateFilter {
            disposition,
            pending: None,
            dropped: 0,
        }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Feed one proxy from the sorted stream. Returns the proxy that
    /// should be published now, if any — under `FirstOnly`/`LastOnly` a
    /// proxy is held back until its whole duplicate group has been seen,
    /// so callers must also call `finish()` once the stream ends.
    pub fn push(&mut self, proxy: RecordProxy) -> Option<RecordProxy> {
        match self.disposition {
            DuplicateDisposition::Original => Some(proxy),
            DuplicateDisposition::Reverse => Some(proxy),
            DuplicateDisposition::FirstOnly => match &self.pending {
                Some(held) if held.key == proxy.key => {
                    self.dropped += 1;
                    None
                }
                _ => self.pending.replace(proxy),
            },
            DuplicateDisposition::LastOnly => match &self.pending {
                Some(held) if held.key == proxy.key => {
                    self.dropped += 1;
                    self.pending = Some(proxy);
                    None
                }
                _ => self.pending.replace(proxy),
            },
        }
    }

    /// Flush any proxy still held back waiting for its group to close.
    pub fn finish(mut self) -> Option<RecordProxy> {
        self.pending.take()
    }
}
