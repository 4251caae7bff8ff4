//! 扫描点序列的属性测试

use proptest::prelude::*;
use timc_client::{ScanDirection, generate};

fn direction() -> impl Strategy<Value = ScanDirection> {
    prop_oneof![
        Just(ScanDirection::Unidirectional),
        Just(ScanDirection::Bidirectional)
    ]
}

proptest! {
    /// 点数：双向 2n+2，单向 3n+3
    #[test]
    fn point_count_follows_step_count(
        direction in direction(),
        start in -100i32..100,
        step in 1i32..10,
        n in 1usize..20,
        descending in any::<bool>(),
    ) {
        let span = step * n as i32;
        let stop = if descending { start - span } else { start + span };
        let points = generate(direction, 0.0, 50.0, start as f64, stop as f64, step as f64);
        let expected = match direction {
            ScanDirection::Bidirectional => 2 * n + 2,
            ScanDirection::Unidirectional => 3 * n + 3,
        };
        prop_assert_eq!(points.len(), expected);
    }

    /// 索引从起点出发、到终点结束，且单调前进
    #[test]
    fn index_runs_from_start_to_stop(
        direction in direction(),
        start in -50i32..50,
        tenths in 1i32..50,
        n in 1usize..20,
        descending in any::<bool>(),
    ) {
        let step = tenths as f64 / 10.0;
        let span = step * n as f64;
        let start = start as f64;
        let stop = if descending { start - span } else { start + span };
        let points = generate(direction, -5.0, 5.0, start, stop, step);

        prop_assert!(!points.is_empty());
        prop_assert!((points[0].index - start).abs() < 0.011);
        prop_assert!((points[points.len() - 1].index - stop).abs() < 0.011);
        for pair in points.windows(2) {
            let delta = pair[1].index - pair[0].index;
            if descending {
                prop_assert!(delta <= 0.0);
            } else {
                prop_assert!(delta >= 0.0);
            }
        }
    }

    /// 扫描轴只在两端之间往返
    #[test]
    fn scan_values_stay_on_endpoints(
        direction in direction(),
        scan_start in -100i32..100,
        scan_stop in -100i32..100,
        n in 1usize..10,
    ) {
        let points = generate(
            direction,
            scan_start as f64,
            scan_stop as f64,
            0.0,
            n as f64,
            1.0,
        );
        for point in &points {
            prop_assert!(point.scan == scan_start as f64 || point.scan == scan_stop as f64);
        }
        // 每个索引值在双向扫描中恰好出现两次
        if direction == ScanDirection::Bidirectional {
            for chunk in points.chunks(2) {
                prop_assert_eq!(chunk[0].index, chunk[1].index);
            }
        }
    }

    /// 生成结果只取决于输入
    #[test]
    fn generation_is_deterministic(
        direction in direction(),
        start in -100i32..100,
        step in 1i32..10,
        n in 1usize..20,
    ) {
        let stop = start + step * n as i32;
        let a = generate(direction, 0.0, 10.0, start as f64, stop as f64, step as f64);
        let b = generate(direction, 0.0, 10.0, start as f64, stop as f64, step as f64);
        prop_assert_eq!(a, b);
    }

    /// 步长不能整除范围时没有点
    #[test]
    fn non_divisible_step_gives_no_points(
        direction in direction(),
        n in 1i32..20,
        step in 2i32..10,
    ) {
        let stop = (step * n + 1) as f64;
        let points = generate(direction, 0.0, 10.0, 0.0, stop, step as f64);
        prop_assert!(points.is_empty());
    }
}
