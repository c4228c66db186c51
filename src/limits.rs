use crate::error::ScanError;

/// Descriptors kept back for stdio, the runtime and logging.
pub const RESERVED_FDS: u64 = 24;

/// How many sockets the probe pool may hold open at once: the soft
/// `RLIMIT_NOFILE` minus [`RESERVED_FDS`].
#[cfg(unix)]
pub fn fd_budget() -> Result<u64, ScanError> {
    use rlimit::Resource;
    let (soft, _hard) = Resource::NOFILE.get().map_err(ScanError::FdLimit)?;
    Ok(soft.saturating_sub(RESERVED_FDS))
}

#[cfg(not(unix))]
pub fn fd_budget() -> Result<u64, ScanError> {
    Ok(1024 - RESERVED_FDS)
}

/// Reject pool sizes of zero or larger than `budget`.
pub fn check_pool_size(pool: usize, budget: u64) -> Result<usize, ScanError> {
    if pool == 0 {
        return Err(ScanError::InvalidPoolSize(pool));
    }
    if pool as u64 > budget {
        return Err(ScanError::PoolExceedsFdBudget { pool, budget });
    }
    Ok(pool)
}

/// Pool size used when none is given: the whole budget, but at least one worker.
pub fn default_pool_size(budget: u64) -> usize {
    usize::try_from(budget).unwrap_or(usize::MAX).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_pool_is_invalid() {
        assert!(matches!(
            check_pool_size(0, 1000),
            Err(ScanError::InvalidPoolSize(0))
        ));
    }

    #[test]
    fn pool_over_budget_is_rejected() {
        let err = check_pool_size(2000, 1000).unwrap_err();
        assert!(err.is_config());
        assert!(matches!(
            err,
            ScanError::PoolExceedsFdBudget {
                pool: 2000,
                budget: 1000
            }
        ));
    }

    #[test]
    fn pool_at_budget_is_fine() {
        assert_eq!(check_pool_size(1000, 1000).unwrap(), 1000);
    }

    #[test]
    fn default_pool_never_zero() {
        assert_eq!(default_pool_size(0), 1);
        assert_eq!(default_pool_size(4072), 4072);
    }

    #[test]
    fn budget_is_readable() {
        assert!(fd_budget().is_ok());
    }
}
