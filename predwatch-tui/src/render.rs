use crate::app::{App, Health};
use chrono::DateTime;
use predwatch_data::{FeedContext, PollStatus, Row, StreamKind, Timeline};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::Marker,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
};
use std::{ops::RangeInclusive, sync::Arc};

/// Columns taken by the y-axis labels and axis line inside a chart block.
const Y_LABEL_WIDTH: u16 = 9;

/// Rows taken by the x-axis labels and axis line inside a chart block.
const X_AXIS_HEIGHT: u16 = 2;

const HORIZON_COLORS: [Color; 6] = [
    Color::Cyan,
    Color::Magenta,
    Color::Yellow,
    Color::Green,
    Color::LightBlue,
    Color::LightRed,
];

/// Snapshot series and how to read them off a row.
const SNAPSHOT_SERIES: [(&str, Color, fn(&Row) -> Option<f64>); 3] = [
    ("bid", Color::Green, Row::bid),
    ("ask", Color::Red, Row::ask),
    ("mid", Color::White, Row::mid),
];

struct Series {
    name: String,
    color: Color,
    points: Vec<(f64, f64)>,
}

/// Draw the whole dashboard and record each chart's plot area on `app`.
pub fn draw(frame: &mut Frame, app: &mut App) {
    let shared = Arc::clone(app.context());
    let context = shared.read();
    let timeline = context.timeline();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header: symbol, health, per-stream rows
            Constraint::Fill(1),   // hft
            Constraint::Fill(1),   // idt
            Constraint::Fill(1),   // snapshot
            Constraint::Length(2), // Footer: hover readout + hotkeys
        ])
        .split(frame.area());

    render_header(frame, chunks[0], app, &context);
    for (slot, stream) in StreamKind::ALL.into_iter().enumerate() {
        render_chart(frame, chunks[1 + slot], app, &context, &timeline, stream);
    }
    render_footer(frame, chunks[4], app, &context, &timeline);
}

fn render_header(frame: &mut Frame, area: Rect, app: &App, context: &FeedContext) {
    let (pill_fg, pill_bg) = match app.health() {
        Health::Connecting => (Color::Black, Color::DarkGray),
        Health::Live => (Color::Black, Color::Green),
        Health::Degraded => (Color::Black, Color::Yellow),
        Health::Down => (Color::White, Color::Red),
    };
    let status = match app.status() {
        PollStatus::Stopped => "stopped",
        PollStatus::Idle => "idle",
        PollStatus::Fetching => "fetching",
    };

    let mut spans = vec![
        Span::styled(
            format!(" {} ", context.symbol()),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" {} ", app.health().label()),
            Style::default().fg(pill_fg).bg(pill_bg).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("  {status}"), Style::default().fg(Color::DarkGray)),
    ];

    for stream in StreamKind::ALL {
        spans.push(Span::raw(format!(
            "  {stream} {}",
            context.store(stream).len()
        )));
    }

    if let Some(updated) = app.last_update() {
        spans.push(Span::styled(
            format!("  updated {}", updated.format("%H:%M:%S")),
            Style::default().fg(Color::DarkGray),
        ));
    }

    if let Some((stream, error)) = app.last_error() {
        spans.push(Span::styled(
            format!("  {stream}: {error}"),
            Style::default().fg(Color::Red),
        ));
    }

    let header = Paragraph::new(Line::from(spans))
        .block(Block::default().borders(Borders::ALL).title(" predwatch "));
    frame.render_widget(header, area);
}

fn render_chart(
    frame: &mut Frame,
    area: Rect,
    app: &mut App,
    context: &FeedContext,
    timeline: &Timeline,
    stream: StreamKind,
) {
    let focused = app.focused() == stream;
    let view = app.view_mut(stream);
    let range = view.visible(timeline.len());
    let hover = view.hover_index();
    let mode = if view.is_following() { "follow" } else { "manual" };

    let unit = if stream.is_prediction() { "bps" } else { "px" };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(if focused {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        })
        .title(format!(" {stream} ({unit}) · {mode} "));

    let inner = block.inner(area);
    app.set_plot_area(
        stream,
        Rect {
            x: inner.x + Y_LABEL_WIDTH.min(inner.width),
            y: inner.y,
            width: inner.width.saturating_sub(Y_LABEL_WIDTH),
            height: inner.height.saturating_sub(X_AXIS_HEIGHT),
        },
    );

    let Some(range) = range else {
        frame.render_widget(Paragraph::new(" waiting for data...").block(block), area);
        return;
    };

    let mut series = collect_series(context, timeline, stream, range.clone());
    let Some((y_min, y_max)) = y_bounds(&series) else {
        frame.render_widget(Paragraph::new(" no rows in window").block(block), area);
        return;
    };

    if let Some(index) = hover.filter(|index| range.contains(index)) {
        series.push(Series {
            name: String::new(),
            color: Color::DarkGray,
            points: vec![(index as f64, y_min), (index as f64, y_max)],
        });
    }

    let datasets = series
        .iter()
        .map(|series| {
            Dataset::default()
                .name(series.name.clone())
                .marker(Marker::Braille)
                .graph_type(GraphType::Line)
                .style(Style::default().fg(series.color))
                .data(&series.points)
        })
        .collect::<Vec<_>>();

    let (start, end) = (*range.start(), *range.end());
    let x_labels = [start, start + (end - start) / 2, end]
        .into_iter()
        .map(|index| {
            let label = timeline
                .get(index)
                .map(|ts| format_ts(ts, "%H:%M:%S"))
                .unwrap_or_default();
            Line::from(label)
        })
        .collect::<Vec<_>>();

    let chart = Chart::new(datasets)
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([start as f64, end as f64])
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([y_min, y_max])
                .labels(vec![
                    Line::from(format!("{y_min:>8.2}")),
                    Line::from(format!("{y_max:>8.2}")),
                ]),
        );

    frame.render_widget(chart, area);
}

/// One series per horizon for prediction streams, bid/ask/mid for the snapshot stream.
/// Indices where the stream has no row produce no point.
fn collect_series(
    context: &FeedContext,
    timeline: &Timeline,
    stream: StreamKind,
    range: RangeInclusive<usize>,
) -> Vec<Series> {
    let points = |value: &dyn Fn(&Row) -> Option<f64>| {
        timeline
            .window(range.clone())
            .filter_map(|(index, ts)| {
                let value = value(context.row_at(stream, ts)?)?;
                Some((index as f64, value))
            })
            .collect::<Vec<_>>()
    };

    if stream.is_prediction() {
        context
            .store(stream)
            .horizons()
            .iter()
            .zip(HORIZON_COLORS.iter().cycle())
            .map(|(&horizon, &color)| Series {
                name: format!("h{horizon}"),
                color,
                points: points(&|row: &Row| row.prediction(horizon)),
            })
            .collect()
    } else {
        SNAPSHOT_SERIES
            .iter()
            .map(|(name, color, read)| Series {
                name: name.to_string(),
                color: *color,
                points: points(read),
            })
            .collect()
    }
}

/// Padded value range across every series, `None` without any point.
fn y_bounds(series: &[Series]) -> Option<(f64, f64)> {
    let (min, max) = series
        .iter()
        .flat_map(|series| series.points.iter().map(|(_, y)| *y))
        .fold(None, |bounds: Option<(f64, f64)>, y| match bounds {
            Some((min, max)) => Some((min.min(y), max.max(y))),
            None => Some((y, y)),
        })?;

    let pad = ((max - min) * 0.05).max(1e-6);
    if (max - min).abs() < f64::EPSILON {
        Some((min - 1.0, max + 1.0))
    } else {
        Some((min - pad, max + pad))
    }
}

fn render_footer(
    frame: &mut Frame,
    area: Rect,
    app: &App,
    context: &FeedContext,
    timeline: &Timeline,
) {
    let readout = app
        .hovered()
        .and_then(|stream| {
            let ts = timeline.get(app.view(stream).hover_index()?)?;
            Some(hover_readout(context, stream, ts))
        })
        .unwrap_or_else(|| " hover a chart for values".to_string());

    let hotkeys = Line::from(vec![
        Span::styled(" [←/→]", Style::default().fg(Color::Yellow)),
        Span::raw(" pan  "),
        Span::styled("[+/-]", Style::default().fg(Color::Yellow)),
        Span::raw(" zoom  "),
        Span::styled("[Tab]", Style::default().fg(Color::Yellow)),
        Span::raw(" focus  "),
        Span::styled("[f]", Style::default().fg(Color::Yellow)),
        Span::raw(" follow  "),
        Span::styled("[s]", Style::default().fg(Color::Yellow)),
        Span::raw(" symbol  "),
        Span::styled("[r]", Style::default().fg(Color::Yellow)),
        Span::raw(" reset  |  [q] Quit"),
    ]);

    let footer = Paragraph::new(vec![
        Line::from(Span::styled(readout, Style::default().fg(Color::White))),
        hotkeys,
    ]);
    frame.render_widget(footer, area);
}

/// Timestamp plus every series value of `stream` at exactly `ts`; `-` where that
/// stream has no row.
fn hover_readout(context: &FeedContext, stream: StreamKind, ts: i64) -> String {
    let row = context.row_at(stream, ts);
    let mut readout = format!(" {} {stream}", format_ts(ts, "%Y-%m-%d %H:%M:%S%.3f"));

    if stream.is_prediction() {
        for &horizon in context.store(stream).horizons() {
            match row.and_then(|row| row.prediction(horizon)) {
                Some(value) => readout.push_str(&format!("  h{horizon} {value:+.2}")),
                None => readout.push_str(&format!("  h{horizon} -")),
            }
        }
    } else {
        for (name, _, read) in SNAPSHOT_SERIES {
            match row.and_then(read) {
                Some(value) => readout.push_str(&format!("  {name} {value:.2}")),
                None => readout.push_str(&format!("  {name} -")),
            }
        }
        if let Some(spread) = row.and_then(Row::spread_bps) {
            readout.push_str(&format!("  spread {spread:.2}bps"));
        }
    }
    readout
}

fn format_ts(ts_ms: i64, format: &str) -> String {
    DateTime::from_timestamp_millis(ts_ms)
        .map(|time| time.format(format).to_string())
        .unwrap_or_else(|| ts_ms.to_string())
}
