use std::fmt;
use std::str::FromStr;

/// How device memory backing a computation is retired once the computation
/// that used it has been enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum AllocationModel {
    /// Memory is released only after the host has observed completion.
    Synchronous,
    /// Memory may be released once the work is enqueued on the compute stream;
    /// the allocator is ordered with respect to that stream.
    ComputeSynchronized,
    /// Memory may be released as soon as the work is enqueued on any stream.
    Asynchronous,
}

impl AllocationModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationModel::Synchronous => "synchronous",
            AllocationModel::ComputeSynchronized => "compute-synchronized",
            AllocationModel::Asynchronous => "asynchronous",
        }
    }

    /// Whether buffers must be retired only after the host has synchronized.
    pub fn synchronous_deallocation(&self) -> bool {
        matches!(self, AllocationModel::Synchronous)
    }
}

impl fmt::Display for AllocationModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AllocationModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "synchronous" => Ok(AllocationModel::Synchronous),
            "compute-synchronized" | "compute_synchronized" => {
                Ok(AllocationModel::ComputeSynchronized)
            }
            "asynchronous" => Ok(AllocationModel::Asynchronous),
            other => Err(format!(
                "Invalid allocation model: '{}'. Use synchronous, compute-synchronized or asynchronous.",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_back() {
        for model in [
            AllocationModel::Synchronous,
            AllocationModel::ComputeSynchronized,
            AllocationModel::Asynchronous,
        ] {
            assert_eq!(model.to_string().parse::<AllocationModel>(), Ok(model));
        }
    }

    #[test]
    fn accepts_underscore_and_case() {
        assert_eq!(
            "Compute_Synchronized".parse::<AllocationModel>(),
            Ok(AllocationModel::ComputeSynchronized)
        );
        assert!("lazy".parse::<AllocationModel>().is_err());
    }

    #[test]
    fn only_synchronous_deallocates_synchronously() {
        assert!(AllocationModel::Synchronous.synchronous_deallocation());
        assert!(!AllocationModel::ComputeSynchronized.synchronous_deallocation());
        assert!(!AllocationModel::Asynchronous.synchronous_deallocation());
    }
}
