use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Last event serial number of the session.
///
/// Written only by the receive loop of the current generation, read by the heartbeat
/// and the driver.
#[derive(Debug, Default)]
pub(crate) struct SnCell(AtomicU64);

impl SnCell {
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Acquire)
    }

    /// Move sn forward, a lower sn is refused and the current one returned.
    pub fn advance(&self, sn: u64) -> Result<(), u64> {
        let last = self.get();
        if sn < last {
            return Err(last);
        }
        self.0.store(sn, Ordering::Release);
        Ok(())
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::Release);
    }
}

/// Session state carried across generations
#[derive(Debug)]
pub(crate) struct Session {
    pub id: Option<String>,
    pub sn: Arc<SnCell>,
}

impl Session {
    pub fn new(sn: Arc<SnCell>) -> Self {
        Self { id: None, sn }
    }

    pub fn resumable(&self) -> bool {
        self.id.is_some()
    }

    /// Forget the session, next connect will be a cold one.
    pub fn clear(&mut self) {
        self.id = None;
        self.sn.reset();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sn_never_goes_back() {
        let cell = SnCell::default();

        let received = [1, 2, 2, 5, 3, 4, 9, 0, 10];
        let mut observed = Vec::new();

        for sn in received {
            let _ = cell.advance(sn);
            observed.push(cell.get());
        }

        assert!(observed.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(cell.get(), 10);
        assert_eq!(cell.advance(7), Err(10));
    }

    #[test]
    fn test_clear_session() {
        let mut session = Session::new(Arc::new(SnCell::default()));
        session.id = Some("abc".to_string());
        session.sn.advance(12).unwrap();

        assert!(session.resumable());

        session.clear();

        assert!(!session.resumable());
        assert_eq!(session.sn.get(), 0);
    }
}
