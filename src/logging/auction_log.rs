use chrono::Utc;
use serde::{Deserialize, Serialize};

/// **单次竞价的聚合日志**
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuctionLog {
    pub timestamp: String,
    pub log_type: String,
    pub tid: String,
    pub call_attempts: usize,
    pub status: String,
    pub total_bids: usize,
    pub partner_call_log: Vec<PartnerCallLog>,
}

/// **单个合作方的调用日志**
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PartnerCallLog {
    pub partner: String,
    pub num_bids: usize,
    pub status: String,
    pub elapsed_ms: u128,
}

impl AuctionLog {
    pub fn new(tid: &str) -> Self {
        Self {
            timestamp: Utc::now().to_rfc3339(),
            log_type: "hbs_auction".to_string(),
            tid: tid.to_string(),
            call_attempts: 0,
            status: "no_bids".to_string(),
            total_bids: 0,
            partner_call_log: Vec::new(),
        }
    }

    pub fn add_partner_call(&mut self, partner: &str, num_bids: usize, status: &str, elapsed_ms: u128) {
        self.partner_call_log.push(PartnerCallLog {
            partner: partner.to_string(),
            num_bids,
            status: status.to_string(),
            elapsed_ms,
        });
        self.call_attempts += 1;
    }

    pub fn set_result(&mut self, total_bids: usize) {
        self.total_bids = total_bids;
        if total_bids > 0 {
            self.status = "success".to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_status_follows_bid_count() {
        let mut log = AuctionLog::new("auction-1");
        log.add_partner_call("xhb", 2, "success", 35);
        log.add_partner_call("other", 0, "call_failed", 120);
        assert_eq!(log.call_attempts, 2);
        log.set_result(2);
        assert_eq!(log.status, "success");
        assert_eq!(log.total_bids, 2);
    }
}
