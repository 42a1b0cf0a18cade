use crate::scheduler::RunResults;
use crate::types::{MetricResult, RankedList};
use std::fmt::Write;

/// 过滤掉没有数据的代理, 按耗时从小到大排序
///
/// `sort_by` is stable, so equal durations keep pool order.
pub fn rank(result: &MetricResult) -> RankedList {
    let mut ranked: RankedList = result
        .iter()
        .filter_map(|(name, value)| value.map(|d| (name.to_string(), d)))
        .collect();
    ranked.sort_by(|a, b| a.1.cmp(&b.1));
    ranked
}

pub fn render(title: &str, ranked: &RankedList) -> String {
    let mut out = format!("\n==== {} TEST RESULTS ====\n", title);
    for (name, value) in ranked {
        let _ = writeln!(out, "{}: {:.2} sec", name, value.as_secs_f64());
    }
    out
}

pub fn print(title: &str, ranked: &RankedList) {
    print!("{}", render(title, ranked));
}

/// 整个运行的报告: 每个指标一个表
pub fn render_run(run: &RunResults) -> String {
    let mut out = String::from("==== PROXY TEST STARTED ====\n");
    for (metric, result) in &run.results {
        out.push_str(&render(metric.title(), &rank(result)));
    }
    out
}
