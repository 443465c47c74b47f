pub const PROVISIONING_POLLS: &str = "stream_pusher_provisioning_polls_total";

pub const TICKS: &str = "stream_pusher_ticks_total";
pub const BACKGROUND_FAULTS: &str = "stream_pusher_background_faults_total";

pub const RECORDS_SUBMITTED: &str = "stream_pusher_records_submitted_total";
pub const RECORDS_DROPPED: &str = "stream_pusher_records_dropped_total";
pub const RECORDS_ACKED: &str = "stream_pusher_records_acked_total";
pub const RECORDS_FAILED: &str = "stream_pusher_records_failed_total";
pub const ACK_LATENCY: &str = "stream_pusher_ack_latency_seconds";
