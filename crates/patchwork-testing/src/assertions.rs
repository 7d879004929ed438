//! Consistency checks shared by integration tests.

use patchwork_core::ComposedList;

use crate::handle::ProbeHandle;
use crate::sink::{render, Mirror};

/// Asserts that the end-position table agrees with every part's count.
pub fn assert_ends_consistent<K, H>(list: &mut ComposedList<K, H>, msg: &str) {
    let total = list.total_count();
    let ends = list.end_positions().to_vec();
    assert_eq!(
        ends.len(),
        list.part_count(),
        "{}: one end per part expected, got {:?}",
        msg,
        ends
    );
    let mut start = 0;
    for (index, &end) in ends.iter().enumerate() {
        assert!(
            end >= start,
            "{}: ends not monotonic at part {}: {:?}",
            msg,
            index,
            ends
        );
        let count = list.part(index).map_or(0, |part| part.count());
        assert_eq!(
            end - start,
            count,
            "{}: part {} spans {} items but reports {}",
            msg,
            index,
            end - start,
            count
        );
        start = end;
    }
    assert_eq!(start, total, "{}: last end differs from total", msg);
}

/// Asserts that every position resolves into a part and maps back to itself.
pub fn assert_resolve_round_trips<K, H>(list: &mut ComposedList<K, H>, msg: &str) {
    let total = list.total_count();
    for position in 0..total {
        let (part, local) = list
            .resolve(position)
            .unwrap_or_else(|err| panic!("{}: resolve({}) failed: {}", msg, position, err));
        let range = list
            .part_range(part)
            .unwrap_or_else(|err| panic!("{}: part_range({}) failed: {}", msg, part, err));
        assert!(
            range.contains(&position),
            "{}: position {} resolved to part {} spanning {:?}",
            msg,
            position,
            part,
            range
        );
        let back = list
            .global_position(part, local)
            .unwrap_or_else(|err| panic!("{}: global_position failed: {}", msg, err));
        assert_eq!(back, position, "{}: round trip through part {}", msg, part);
    }
    assert!(
        list.resolve(total).is_err(),
        "{}: position {} past the end resolved",
        msg,
        total
    );
}

/// Asserts that a mirror kept up to date by events renders the same rows as
/// a fresh read of the list.
pub fn assert_mirrors<K: 'static>(
    mirror: &Mirror,
    list: &mut ComposedList<K, ProbeHandle>,
    msg: &str,
) {
    let replayed = mirror
        .refresh(list)
        .unwrap_or_else(|err| panic!("{}: refreshing mirror failed: {}", msg, err));
    let fresh = render(list).unwrap_or_else(|err| panic!("{}: render failed: {}", msg, err));
    assert_eq!(replayed, fresh, "{}: mirror diverged from list", msg);
}

/// Asserts that a rendered list equals the expected rows.
pub fn assert_rows<K: 'static>(list: &mut ComposedList<K, ProbeHandle>, expected: &[&str], msg: &str) {
    let rows = render(list).unwrap_or_else(|err| panic!("{}: render failed: {}", msg, err));
    assert_eq!(rows, expected, "{}: rows differ", msg);
}
