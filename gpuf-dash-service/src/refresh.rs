use std::sync::atomic::{AtomicBool, Ordering};

use gpuf_dash_error::{DashboardError, Result};

/// 새로고침 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Refreshing,
}

/// 새로고침 재진입 게이트.
///
/// Idle에서 Refreshing으로의 전이는 CAS 한 번으로 끝나고, 복귀는 티켓 드롭이
/// 보장한다. 성공이든 에러든 어느 경로로 빠져나가도 게이트는 풀린다.
pub struct RefreshGate {
    busy: AtomicBool,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self {
            busy: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> RefreshState {
        if self.busy.load(Ordering::Acquire) {
            RefreshState::Refreshing
        } else {
            RefreshState::Idle
        }
    }

    /// 게이트 획득. 이미 새로고침이 진행 중이면 에러.
    pub fn begin(&self) -> Result<RefreshTicket<'_>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            Ok(RefreshTicket { gate: self })
        } else {
            Err(DashboardError::RefreshInProgress)
        }
    }
}

impl Default for RefreshGate {
    fn default() -> Self {
        Self::new()
    }
}

/// 드롭 시 게이트를 Idle로 되돌리는 티켓
pub struct RefreshTicket<'a> {
    gate: &'a RefreshGate,
}

impl Drop for RefreshTicket<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}
