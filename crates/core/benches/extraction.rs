use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use glean_core::{Document, Extract, Schema};

fn listing_html(rows: usize) -> String {
    let mut html = String::from("<html><body><ul class=\"listing\">");
    for i in 0..rows {
        html.push_str(&format!(
            r#"<li class="row"><a class="name" href="/kata/{i}">Kata {i}</a><span class="rank">{} kyu</span><span class="tag">algorithms</span><span class="tag">strings</span></li>"#,
            i % 8 + 1
        ));
    }
    html.push_str("</ul></body></html>");
    html
}

fn listing_schema() -> Schema {
    let row = Schema::builder("row")
        .field("href", Extract::one("a.name").unwrap().attr("href"))
        .field("name", Extract::one("a.name").unwrap().text())
        .field("rank", Extract::one(".rank").unwrap().text().regex(r"(\d+) kyu").unwrap())
        .field("tags", Extract::many(".tag").unwrap().text())
        .build()
        .unwrap();

    Schema::builder("listing").records("rows", Extract::many(".row").unwrap(), row.into()).build().unwrap()
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for rows in [10, 100, 1000] {
        let html = listing_html(rows);
        group.bench_with_input(BenchmarkId::from_parameter(rows), &html, |b, html| {
            b.iter(|| Document::parse(black_box(html)))
        });
    }

    group.finish();
}

fn bench_resolve(c: &mut Criterion) {
    let schema = listing_schema();
    let mut group = c.benchmark_group("resolve");

    for rows in [10, 100, 1000] {
        let doc = Document::parse(&listing_html(rows));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &doc, |b, doc| {
            b.iter(|| schema.resolve(black_box(doc.root())))
        });
    }

    group.finish();
}

fn bench_regex_post_process(c: &mut Criterion) {
    let html = r#"<script>window.data = JSON.parse("{\"slug\":\"two-sum\",\"likes\":42}");</script>"#;
    let doc = Document::parse(html);
    let spec = Extract::one("script")
        .unwrap()
        .text()
        .regex_with(r#"JSON\.parse\("(.*)"\)"#, |caps| {
            let inner: String = serde_json::from_str(&format!("\"{}\"", &caps[1]))?;
            Ok(serde_json::from_str::<serde_json::Value>(&inner)?.into())
        })
        .unwrap();

    c.bench_function("regex_post_process", |b| b.iter(|| spec.resolve(black_box(doc.root()), "data")));
}

criterion_group!(benches, bench_parse, bench_resolve, bench_regex_post_process);
criterion_main!(benches);
