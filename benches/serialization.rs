//! Serialization benchmarks
//!
//! Measures wire encode/decode cost without network I/O: request lines on
//! the way out, pushed gaze frames and calibration results on the way in.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gazelink::protocol::types::{CalibrationResult, TrackerValues};
use gazelink::protocol::{keys, Request, Response};

const GAZE_PUSH: &str = r#"{"category":"tracker","request":"get","statuscode":200,"values":{"frame":{"timestamp":"2014-04-03 14:25:31.302","time":1396527931302,"fix":true,"state":7,"raw":{"x":812.4,"y":440.9},"avg":{"x":815.1,"y":438.2},"lefteye":{"raw":{"x":790.0,"y":441.2},"avg":{"x":792.7,"y":439.0},"psize":21.3,"pcenter":{"x":0.41,"y":0.52}},"righteye":{"raw":{"x":834.8,"y":440.6},"avg":{"x":837.5,"y":437.4},"psize":20.9,"pcenter":{"x":0.58,"y":0.51}}}}}"#;

fn calibration_line() -> String {
    let points: Vec<String> = (0..9)
        .map(|i| {
            format!(
                r#"{{"state":2,"cp":{{"x":{x},"y":{y}}},"mecp":{{"x":{x},"y":{y}}},"acd":{{"ad":0.4,"adl":0.4,"adr":0.4}},"mepix":{{"mep":12,"mepl":12,"mepr":12}},"asdp":{{"asd":4,"asdl":4,"asdr":4}}}}"#,
                x = 160 + 800 * (i % 3),
                y = 120 + 420 * (i / 3)
            )
        })
        .collect();
    format!(
        r#"{{"category":"calibration","request":"pointend","id":12,"statuscode":200,"values":{{"calibresult":{{"result":true,"deg":0.4,"degl":0.4,"degr":0.4,"calibpoints":[{}]}}}}}}"#,
        points.join(",")
    )
}

fn bench_request_encode(c: &mut Criterion) {
    c.bench_function("state_snapshot_request_encode", |b| {
        b.iter(|| {
            let request = Request::tracker_get(keys::ALL_STATES).with_id(7);
            black_box(request.to_line().unwrap())
        });
    });

    c.bench_function("point_start_request_encode", |b| {
        b.iter(|| {
            let request = Request::calibration_point_start(960, 540).with_id(8);
            black_box(request.to_line().unwrap())
        });
    });
}

fn bench_gaze_push_decode(c: &mut Criterion) {
    c.bench_function("gaze_push_decode", |b| {
        b.iter(|| {
            let response = Response::from_line(black_box(GAZE_PUSH)).unwrap();
            let values: TrackerValues = response.decode_values().unwrap();
            black_box(values)
        });
    });

    c.bench_function("batch_60_gaze_push_decode", |b| {
        b.iter(|| {
            let mut fixated = 0;
            for _ in 0..60 {
                let response = Response::from_line(GAZE_PUSH).unwrap();
                let values: TrackerValues = response.decode_values().unwrap();
                if values.frame.map_or(false, |f| f.is_fixated) {
                    fixated += 1;
                }
            }
            black_box(fixated)
        });
    });
}

fn bench_calibration_result_decode(c: &mut Criterion) {
    let line = calibration_line();
    c.bench_function("calibration_result_decode", |b| {
        b.iter(|| {
            let response = Response::from_line(black_box(&line)).unwrap();
            let result: CalibrationResult =
                serde_json::from_value(response.values["calibresult"].clone()).unwrap();
            black_box(result)
        });
    });
}

criterion_group!(
    benches,
    bench_request_encode,
    bench_gaze_push_decode,
    bench_calibration_result_decode
);

criterion_main!(benches);
