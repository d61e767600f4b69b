// Wave packing : sort content-extraction jobs by file size
// ascending, then pack into groups whose cumulative byte size stays under
// a per-wave budget. Pure function, no I/O — grounded on the same
// "partition work to respect a hard external limit" shape as
// `extraction::build_chunks`, just packing by cumulative size instead of
// splitting by page count.

pub const DEFAULT_WAVE_BYTE_BUDGET: u64 = 10 * 1024 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct WaveItem<T> {
 pub key: String,
 pub byte_size: u64,
 pub payload: T,
}

/// Pack items into waves, each at or under `budget` cumulative bytes. A
/// single item larger than the budget still gets its own wave (never
/// dropped).
pub fn pack_waves<T>(mut items: Vec<WaveItem<T>>, budget: u64) -> Vec<Vec<WaveItem<T>>> {
 items.sort_by_key(|i| i.byte_size);

 let mut waves = Vec::new();
 let mut current: Vec<WaveItem<T>> = Vec::new();
 let mut current_bytes: u64 = 0;

 for item in items {
 if !current.is_empty() && current_bytes + item.byte_size > budget {
 waves.push(std::mem::take(&mut current));
 current_bytes = 0;
 }
 current_bytes += item.byte_size;
 current.push(item);
 }
 if !current.is_empty() {
 waves.push(current);
 }
 waves
}

#[cfg(test)]
mod tests {
 use super::*;

    fn item(key: &str, size: u64) -> WaveItem<()> {
        WaveItem {
            key: key.to_string(),
            byte_size: size,
            payload: (),
        }
    }

 #[test]
 fn packs_items_under_budget() {
 let items = vec![item("a", 4), item("b", 3), item("c", 5)];
 let waves = pack_waves(items, 7);
 assert_eq!(waves.len(), 2);
 assert_eq!(waves[0].iter().map(|i| i.byte_size).sum::<u64>(), 7);
 }

 #[test]
 fn oversized_single_item_gets_its_own_wave() {
 let items = vec![item("huge", 100)];
 let waves = pack_waves(items, 10);
 assert_eq!(waves.len(), 1);
 assert_eq!(waves[0].len(), 1);
 }

 #[test]
 fn sorts_ascending_before_packing() {
 let items = vec![item("big", 9), item("small", 1)];
 let waves = pack_waves(items, 9);
 assert_eq!(waves[0][0].key, "small");
 }
}
