//! SVG charts over flat listing records.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use tracing::info;

use crate::analysis::{bin_counts, bin_edges, label_of, price_of, quantile, value_counts};
use crate::db::Document;

const WIDTH: f64 = 1200.0;
const HEIGHT: f64 = 600.0;
const MARGIN_LEFT: f64 = 80.0;
const MARGIN_RIGHT: f64 = 30.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_BOTTOM: f64 = 120.0;
const HIST_BINS: usize = 30;
const TOP_BARS: usize = 10;

pub struct ChartRenderer<'a> {
    docs: &'a [Document],
    output_dir: PathBuf,
}

impl<'a> ChartRenderer<'a> {
    pub fn new(docs: &'a [Document], output_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("Failed to create {:?}", output_dir))?;
        info!("Initialized visualizer, output directory: {}", output_dir.display());
        Ok(ChartRenderer {
            docs,
            output_dir: output_dir.to_path_buf(),
        })
    }

    /// Every chart, in a fixed order.
    pub fn render_all(&self) -> Result<Vec<PathBuf>> {
        Ok(vec![
            self.price_distribution()?,
            self.location_distribution()?,
            self.category_distribution()?,
            self.price_by_location()?,
        ])
    }

    pub fn price_distribution(&self) -> Result<PathBuf> {
        let mut prices: Vec<f64> = self.docs.iter().filter_map(price_of).collect();
        prices.sort_by(f64::total_cmp);

        let bars = if prices.is_empty() {
            Vec::new()
        } else {
            let edges = bin_edges(&prices, HIST_BINS);
            bin_counts(&prices, &edges)
                .into_iter()
                .zip(edges.windows(2))
                .map(|(count, w)| (format!("{:.0}", w[1]), count))
                .collect()
        };
        let svg = bar_chart("商品价格分布", "价格", "数量", &bars, true)?;
        self.save("price_distribution.svg", &svg)
    }

    pub fn location_distribution(&self) -> Result<PathBuf> {
        let svg = self.top_counts_chart("location", "Top 10 地区分布", "地区")?;
        self.save("location_distribution.svg", &svg)
    }

    pub fn category_distribution(&self) -> Result<PathBuf> {
        let svg = self.top_counts_chart("category_id", "Top 10 类别分布", "类别")?;
        self.save("category_distribution.svg", &svg)
    }

    pub fn price_by_location(&self) -> Result<PathBuf> {
        let mut groups: Vec<(String, Vec<f64>)> = Vec::new();
        for doc in self.docs {
            let (Some(loc), Some(price)) = (label_of(doc, "location"), price_of(doc)) else {
                continue;
            };
            match groups.iter_mut().find(|(l, _)| *l == loc) {
                Some((_, prices)) => prices.push(price),
                None => groups.push((loc, vec![price])),
            }
        }
        for (_, prices) in &mut groups {
            prices.sort_by(f64::total_cmp);
        }
        let svg = box_plot("各地区价格分布", "地区", "价格", &groups)?;
        self.save("price_by_location.svg", &svg)
    }

    fn top_counts_chart(&self, key: &str, title: &str, x_label: &str) -> Result<String> {
        let bars: Vec<(String, usize)> = value_counts(self.docs, key)
            .into_iter()
            .take(TOP_BARS)
            .map(|c| (c.value, c.count))
            .collect();
        bar_chart(title, x_label, "数量", &bars, false)
    }

    fn save(&self, filename: &str, svg: &str) -> Result<PathBuf> {
        let path = self.output_dir.join(filename);
        std::fs::write(&path, svg).with_context(|| format!("Failed to write {:?}", path))?;
        info!("Plot saved to {}", path.display());
        Ok(path)
    }
}

fn plot_w() -> f64 {
    WIDTH - MARGIN_LEFT - MARGIN_RIGHT
}

fn plot_h() -> f64 {
    HEIGHT - MARGIN_TOP - MARGIN_BOTTOM
}

fn px(v: f64) -> String {
    format!("{:.1}", v)
}

/// SVG document built on a `quick_xml::Writer`; text and attribute values
/// are escaped by the writer.
struct Svg {
    writer: Writer<Vec<u8>>,
}

impl Svg {
    /// Root element, title, axis labels and axes.
    fn open(title: &str, x_label: &str, y_label: &str) -> Result<Self> {
        let mut svg = Svg {
            writer: Writer::new(Vec::new()),
        };
        let (w, h) = (WIDTH.to_string(), HEIGHT.to_string());
        let view_box = format!("0 0 {} {}", w, h);
        svg.writer.write_event(Event::Start(BytesStart::new("svg").with_attributes([
            ("xmlns", "http://www.w3.org/2000/svg"),
            ("width", w.as_str()),
            ("height", h.as_str()),
            ("viewBox", view_box.as_str()),
            ("font-family", "Microsoft YaHei, sans-serif"),
        ])))?;
        svg.empty(
            "rect",
            &[
                ("width", "100%".into()),
                ("height", "100%".into()),
                ("fill", "white".into()),
            ],
        )?;

        let cx = px(WIDTH / 2.0);
        let cy = px(MARGIN_TOP + plot_h() / 2.0);
        svg.text(
            &[
                ("x", cx.clone()),
                ("y", "32".into()),
                ("text-anchor", "middle".into()),
                ("font-size", "20".into()),
            ],
            title,
        )?;
        svg.text(
            &[
                ("x", cx),
                ("y", px(HEIGHT - 12.0)),
                ("text-anchor", "middle".into()),
                ("font-size", "14".into()),
            ],
            x_label,
        )?;
        svg.text(
            &[
                ("x", "20".into()),
                ("y", cy.clone()),
                ("text-anchor", "middle".into()),
                ("font-size", "14".into()),
                ("transform", format!("rotate(-90 20 {})", cy)),
            ],
            y_label,
        )?;

        let (l, r, t, b) = (
            MARGIN_LEFT,
            WIDTH - MARGIN_RIGHT,
            MARGIN_TOP,
            MARGIN_TOP + plot_h(),
        );
        svg.line(l, b, r, b, &[])?;
        svg.line(l, t, l, b, &[])?;
        Ok(svg)
    }

    fn empty(&mut self, name: &str, attrs: &[(&str, String)]) -> Result<()> {
        self.writer
            .create_element(name)
            .with_attributes(attrs.iter().map(|(k, v)| (*k, v.as_str())))
            .write_empty()?;
        Ok(())
    }

    fn text(&mut self, attrs: &[(&str, String)], content: &str) -> Result<()> {
        self.writer
            .create_element("text")
            .with_attributes(attrs.iter().map(|(k, v)| (*k, v.as_str())))
            .write_text_content(BytesText::new(content))?;
        Ok(())
    }

    fn line(&mut self, x1: f64, y1: f64, x2: f64, y2: f64, extra: &[(&str, String)]) -> Result<()> {
        let mut attrs = vec![
            ("x1", px(x1)),
            ("y1", px(y1)),
            ("x2", px(x2)),
            ("y2", px(y2)),
            ("stroke", "black".to_string()),
        ];
        attrs.extend_from_slice(extra);
        self.empty("line", &attrs)
    }

    /// Tick label under the x axis, rotated 45 degrees.
    fn x_label(&mut self, x: f64, label: &str) -> Result<()> {
        let (lx, ly) = (px(x), px(MARGIN_TOP + plot_h() + 16.0));
        self.text(
            &[
                ("x", lx.clone()),
                ("y", ly.clone()),
                ("text-anchor", "end".into()),
                ("font-size", "11".into()),
                ("transform", format!("rotate(-45 {} {})", lx, ly)),
            ],
            label,
        )
    }

    fn y_ticks(&mut self, max: f64) -> Result<()> {
        for i in 0..=4 {
            let v = max * i as f64 / 4.0;
            let y = MARGIN_TOP + plot_h() - plot_h() * i as f64 / 4.0;
            self.text(
                &[
                    ("x", px(MARGIN_LEFT - 6.0)),
                    ("y", px(y + 4.0)),
                    ("text-anchor", "end".into()),
                    ("font-size", "11".into()),
                ],
                &format!("{:.0}", v),
            )?;
        }
        Ok(())
    }

    fn finish(mut self) -> Result<String> {
        self.writer.write_event(Event::End(BytesEnd::new("svg")))?;
        let mut out = String::from_utf8(self.writer.into_inner())?;
        out.push('\n');
        Ok(out)
    }
}

/// Vertical bars; `contiguous` draws a histogram without gaps.
fn bar_chart(
    title: &str,
    x_label: &str,
    y_label: &str,
    bars: &[(String, usize)],
    contiguous: bool,
) -> Result<String> {
    let mut svg = Svg::open(title, x_label, y_label)?;
    let max = bars.iter().map(|(_, c)| *c).max().unwrap_or(0).max(1) as f64;
    svg.y_ticks(max)?;

    let slot = plot_w() / bars.len().max(1) as f64;
    let bar_w = if contiguous { slot } else { slot * 0.7 };
    let base = MARGIN_TOP + plot_h();
    for (i, (label, count)) in bars.iter().enumerate() {
        let h = plot_h() * *count as f64 / max;
        let x = MARGIN_LEFT + slot * i as f64 + (slot - bar_w) / 2.0;
        svg.empty(
            "rect",
            &[
                ("x", px(x)),
                ("y", px(base - h)),
                ("width", px(bar_w)),
                ("height", px(h)),
                ("fill", "#4c72b0".into()),
                ("stroke", "white".into()),
            ],
        )?;
        svg.x_label(x + bar_w / 2.0, label)?;
    }
    svg.finish()
}

/// One box (quartiles, median, min/max whiskers) per group.
fn box_plot(
    title: &str,
    x_label: &str,
    y_label: &str,
    groups: &[(String, Vec<f64>)],
) -> Result<String> {
    let mut svg = Svg::open(title, x_label, y_label)?;
    let max = groups
        .iter()
        .filter_map(|(_, p)| p.last().copied())
        .fold(0.0_f64, f64::max)
        .max(1.0);
    svg.y_ticks(max)?;

    let base = MARGIN_TOP + plot_h();
    let y = |v: f64| base - plot_h() * v / max;
    let slot = plot_w() / groups.len().max(1) as f64;
    for (i, (label, prices)) in groups.iter().enumerate() {
        let (Some(&lo), Some(&hi)) = (prices.first(), prices.last()) else {
            continue;
        };
        let (q1, med, q3) = (
            quantile(prices, 0.25),
            quantile(prices, 0.5),
            quantile(prices, 0.75),
        );
        let cx = MARGIN_LEFT + slot * (i as f64 + 0.5);
        let half = slot * 0.3;
        svg.line(cx, y(hi), cx, y(lo), &[])?;
        svg.empty(
            "rect",
            &[
                ("x", px(cx - half)),
                ("y", px(y(q3))),
                ("width", px(half * 2.0)),
                ("height", px((y(q1) - y(q3)).max(1.0))),
                ("fill", "#dd8452".into()),
                ("stroke", "black".into()),
            ],
        )?;
        svg.line(
            cx - half,
            y(med),
            cx + half,
            y(med),
            &[("stroke-width", "2".into())],
        )?;
        svg.x_label(cx, label)?;
    }
    svg.finish()
}
