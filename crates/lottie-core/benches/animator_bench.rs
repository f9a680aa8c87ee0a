use criterion::{black_box, criterion_group, criterion_main, Criterion};
use glam::{Vec2, Vec3};
use lottie_core::animatable::{InterpolationCurve, Keyframe, KeyframeGroup};
use lottie_core::layers::{Repeater, RepeaterTransform};
use lottie_core::resolve_transform;

fn eased_group(len: usize) -> KeyframeGroup<Vec3> {
    let easing = InterpolationCurve::CubicBezier {
        out_tangent: Vec2::new(0.33, 0.0),
        in_tangent: Vec2::new(0.67, 1.0),
    };
    let keyframes = (0..len)
        .map(|i| {
            let t = i as f32 * 10.0;
            Keyframe::new(t, Vec3::new(t, t * 0.5, 0.0)).with_easing(easing)
        })
        .collect();
    KeyframeGroup::new(keyframes).unwrap()
}

fn bench_sampling(c: &mut Criterion) {
    let group = eased_group(64);
    c.bench_function("keyframe_group_value_at", |b| {
        let mut frame = 0.0f32;
        b.iter(|| {
            frame = (frame + 0.37) % 640.0;
            black_box(group.value_at(black_box(frame)))
        })
    });
}

fn bench_repeater_derivation(c: &mut Criterion) {
    let repeater = Repeater::new(32)
        .with_position(eased_group(8))
        .with_rotation(KeyframeGroup::new(vec![Keyframe::new(0.0, 0.0), Keyframe::new(60.0, 30.0)]).unwrap());
    c.bench_function("repeater_transform_resolve", |b| {
        b.iter(|| {
            for index in 0..repeater.copies {
                let copy = RepeaterTransform::new(&repeater, index);
                black_box(resolve_transform(&copy, black_box(24.0)));
            }
        })
    });
}

criterion_group!(benches, bench_sampling, bench_repeater_derivation);
criterion_main!(benches);
