use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use geneforge::customize::ValidationReport;
use geneforge::metrics::PerformanceMetrics;
use geneforge::optimizer::history::{OptimizationIteration, RunReport};

fn new_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

fn fmt_opt(v: Option<f64>, precision: usize) -> String {
    v.map(|x| format!("{:.*}", precision, x))
        .unwrap_or_else(|| "-".to_string())
}

fn pass_cell(ok: bool) -> Cell {
    if ok {
        Cell::new("PASS").fg(Color::Green)
    } else {
        Cell::new("FAIL").fg(Color::Red)
    }
}

pub fn print_metrics(metrics: &PerformanceMetrics) {
    println!(
        "\n📊 Circuit score: {:.4}   avg ON/OFF: {}   avg leakage: {}",
        metrics.overall_score,
        fmt_opt(metrics.average_on_off_ratio, 2),
        fmt_opt(metrics.average_leakage, 3)
    );

    if !metrics.has_outputs() {
        println!("⚠️  No output activity found.");
        return;
    }

    let mut table = new_table();
    table.add_row(vec![
        Cell::new("Output").add_attribute(Attribute::Bold),
        Cell::new("ON/OFF").fg(Color::Cyan),
        Cell::new("Leak %"),
        Cell::new("dB"),
        Cell::new("Ratio"),
        Cell::new("Leak"),
    ]);
    for i in 1..=3 {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }

    for (output, ratio) in &metrics.on_off_ratios {
        let standards = metrics.meets_standards.get(output);
        table.add_row(vec![
            Cell::new(output).add_attribute(Attribute::Bold),
            Cell::new(format!("{:.2}", ratio)).fg(Color::Cyan),
            Cell::new(fmt_opt(metrics.leakage.get(output).copied(), 3)),
            Cell::new(fmt_opt(metrics.dynamic_range.get(output).copied(), 1)),
            pass_cell(standards.map(|s| s.on_off_ratio).unwrap_or(false)),
            pass_cell(standards.map(|s| s.leakage).unwrap_or(false)),
        ]);
    }
    println!("{}", table);

    if let Some(usage) = &metrics.part_usage {
        println!(
            "🧩 Parts used: {} promoters, {} RBS, {} CDS, {} terminators, {} ribozymes",
            usage.promoters.len(),
            usage.rbs.len(),
            usage.cds.len(),
            usage.terminators.len(),
            usage.ribozymes.len()
        );
    }
}

pub fn print_validation_report(title: &str, report: &ValidationReport) {
    let status = if report.valid { "✅ valid" } else { "❌ invalid" };
    println!("\n{}: {}", title, status);

    if report.errors.is_empty() && report.warnings.is_empty() && report.dropped.is_empty() {
        return;
    }

    let mut table = new_table();
    table.add_row(vec![
        Cell::new("Level").add_attribute(Attribute::Bold),
        Cell::new("Message").add_attribute(Attribute::Bold),
    ]);
    for e in &report.errors {
        table.add_row(vec![Cell::new("error").fg(Color::Red), Cell::new(e)]);
    }
    for w in &report.warnings {
        table.add_row(vec![Cell::new("warning").fg(Color::Yellow), Cell::new(w)]);
    }
    for d in &report.dropped {
        table.add_row(vec![
            Cell::new("dropped").fg(Color::Magenta),
            Cell::new(d),
        ]);
    }
    println!("{}", table);
}

pub fn print_iteration(iteration: &OptimizationIteration, best_index: usize) {
    let m = &iteration.metrics;
    let marker = if iteration.index == best_index { "🏆" } else { "  " };
    println!(
        "{} Iter {:>2} [{}] score {:.4} | ON/OFF {} | leak {} | parts {}",
        marker,
        iteration.index,
        iteration.kind,
        m.overall_score,
        fmt_opt(m.average_on_off_ratio, 2),
        fmt_opt(m.average_leakage, 3),
        iteration.optimized_parts.len()
    );
}

pub fn print_run_report(report: &RunReport) {
    println!("\n🏁 Stopped: {}", report.stop_reason);

    let mut table = new_table();
    table.add_row(vec![
        Cell::new("Iter").add_attribute(Attribute::Bold),
        Cell::new("Kind"),
        Cell::new("Score").fg(Color::Cyan),
        Cell::new("Avg ON/OFF"),
        Cell::new("Avg Leak %"),
        Cell::new("Vote"),
        Cell::new("Library"),
    ]);
    for i in 2..=4 {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }

    for it in &report.iterations {
        let is_best = report.best_iteration == Some(it.index);
        let vote = match &it.comparison {
            Some(c) if c.improved => Cell::new(format!("+{}/-{}", c.improvements, c.regressions))
                .fg(Color::Green),
            Some(c) => Cell::new(format!("+{}/-{}", c.improvements, c.regressions)).fg(Color::Red),
            None => Cell::new("-"),
        };
        let mut iter_cell = Cell::new(it.index);
        if is_best {
            iter_cell = iter_cell.add_attribute(Attribute::Bold).fg(Color::Green);
        }
        table.add_row(vec![
            iter_cell,
            Cell::new(it.kind),
            Cell::new(format!("{:.4}", it.metrics.overall_score)).fg(Color::Cyan),
            Cell::new(fmt_opt(it.metrics.average_on_off_ratio, 2)),
            Cell::new(fmt_opt(it.metrics.average_leakage, 3)),
            vote,
            Cell::new(it.library_path.display()),
        ]);
    }
    println!("{}", table);

    if !report.optimized_parts.is_empty() {
        let mut parts = new_table();
        parts.add_row(vec![
            Cell::new("Iter").add_attribute(Attribute::Bold),
            Cell::new("Part").add_attribute(Attribute::Bold),
            Cell::new("Gate"),
            Cell::new("Target"),
            Cell::new("Strength"),
            Cell::new("Change %"),
        ]);
        for p in &report.optimized_parts {
            parts.add_row(vec![
                Cell::new(p.iteration),
                Cell::new(&p.name),
                Cell::new(p.gate.as_deref().unwrap_or("-")),
                Cell::new(format!("{:.2}", p.target_strength)),
                Cell::new(format!(
                    "{} -> {:.3}",
                    fmt_opt(p.original_strength, 3),
                    p.predicted_strength
                )),
                Cell::new(fmt_opt(p.strength_change_pct, 1)),
            ]);
        }
        println!("{}", parts);
    }

    if let Some(best) = report.best() {
        println!("🏆 Best design: iteration {} ({})", best.index, best.library_path.display());
    }
}
