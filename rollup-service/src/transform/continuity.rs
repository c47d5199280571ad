use meter_client::domain::Reading;

/// True when two readings adjacent in arrival order come from different
/// hardware, i.e. the meter was exchanged between them.
///
/// Comparison is exact and case-sensitive; two absent device ids are equal.
pub fn exchange_boundary(a: &Reading, b: &Reading) -> bool {
    a.device_id != b.device_id
}
