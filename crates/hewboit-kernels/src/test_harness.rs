/// End-to-end scenarios driving `ReferencePipeline` through whole frames.
///
/// Scenes are built from deterministic fragment lists so every test runs
/// without a GPU and gives the same answer under any rayon schedule, up to
/// float summation order.

#[cfg(test)]
mod tests {
    use glam::{Vec2, Vec3, Vec4};
    use hewboit_core::constants::OPTICAL_DEPTH_QUANT_MAX;
    use hewboit_core::{AlphaMode, FrameParity, OitSettings, WeightStrategy};

    use crate::accumulate::Fragment;
    use crate::frame::ReferencePipeline;
    use crate::resolve::ResolvedImage;

    fn sheet(width: u32, height: u32, color: Vec3, alpha: f32, depth: f32) -> Vec<Fragment> {
        (0..height)
            .flat_map(|y| {
                (0..width).map(move |x| Fragment {
                    position: Vec2::new(x as f32 + 0.5, y as f32 + 0.5),
                    color,
                    alpha,
                    depth,
                })
            })
            .collect()
    }

    fn max_difference(a: &ResolvedImage, b: &ResolvedImage) -> f32 {
        a.pixels
            .iter()
            .zip(&b.pixels)
            .map(|(pa, pb)| match (pa, pb) {
                (Some(pa), Some(pb)) => (*pa - *pb).abs().max_element(),
                (None, None) => 0.0,
                _ => f32::INFINITY,
            })
            .fold(0.0, f32::max)
    }

    #[test]
    fn test_single_opaque_fragment_end_to_end() {
        let mut pipeline = ReferencePipeline::new(OitSettings::default(), 64, 64).unwrap();
        let fragment = Fragment {
            position: Vec2::new(12.5, 20.5),
            color: Vec3::ONE,
            alpha: 1.0,
            depth: 5.5 / 64.0,
        };

        pipeline.begin_frame();
        assert_eq!(pipeline.accumulate(&[fragment]), 1);
        assert_eq!(pipeline.histogram().load(0, 5), OPTICAL_DEPTH_QUANT_MAX);

        let stats = pipeline.build_cdf();
        assert_eq!(stats.tiles, 4);
        assert_eq!(stats.empty_tiles, 3);
        assert!(pipeline.histogram().is_clear());
        pipeline.end_frame();

        let cdf = pipeline.latest_cdf();
        for bin in 0..5 {
            assert!(cdf.get(0, 0, bin).abs() < 1e-6, "bin {bin}");
        }
        for bin in 5..64 {
            assert!((cdf.get(0, 0, bin) - 1.0).abs() < 1e-6, "bin {bin}");
        }
        // Untouched tiles fall back to the ramp
        assert_eq!(cdf.get(1, 0, 63), 1.0);
        assert_eq!(cdf.get(1, 0, 0), 1.0 / 64.0);
    }

    #[test]
    fn test_submission_order_does_not_matter() {
        let mut fragments = sheet(32, 32, Vec3::new(1.0, 0.0, 0.0), 0.4, 0.2);
        fragments.extend(sheet(32, 32, Vec3::new(0.0, 0.0, 1.0), 0.6, 0.7));
        fragments.extend(sheet(16, 16, Vec3::new(0.0, 1.0, 0.0), 0.3, 0.45));
        let mut reversed = fragments.clone();
        reversed.reverse();

        let mut forward = ReferencePipeline::new(OitSettings::default(), 32, 32).unwrap();
        let mut backward = ReferencePipeline::new(OitSettings::default(), 32, 32).unwrap();
        for _ in 0..3 {
            let a = forward.render_frame(&fragments);
            let b = backward.render_frame(&reversed);
            assert!(max_difference(&a, &b) < 1e-5);
        }
    }

    #[test]
    fn test_static_scene_is_stable_after_first_frame() {
        let mut fragments = sheet(48, 40, Vec3::new(0.9, 0.6, 0.1), 0.35, 0.3);
        fragments.extend(sheet(40, 48, Vec3::new(0.1, 0.3, 0.9), 0.5, 0.8));
        let mut pipeline = ReferencePipeline::new(OitSettings::default(), 48, 48).unwrap();

        pipeline.render_frame(&fragments);
        let second = pipeline.render_frame(&fragments);
        let third = pipeline.render_frame(&fragments);
        assert!(max_difference(&second, &third) < 1e-5);
        assert_eq!(pipeline.parity(), FrameParity::Odd);
    }

    #[test]
    fn test_equalization_favors_near_layer() {
        // Near red over far blue: the near layer must dominate the average
        let mut fragments = sheet(32, 32, Vec3::new(1.0, 0.0, 0.0), 0.5, 0.1);
        fragments.extend(sheet(32, 32, Vec3::new(0.0, 0.0, 1.0), 0.5, 0.9));
        let mut pipeline = ReferencePipeline::new(OitSettings::default(), 32, 32).unwrap();

        let first = pipeline.render_frame(&fragments);
        let px = first.get(5, 5).unwrap();
        // No history yet: equal weights
        assert!((px.x - px.z).abs() < 1e-5);

        let second = pipeline.render_frame(&fragments);
        let px = second.get(5, 5).unwrap();
        assert!(px.x > px.z, "near layer should dominate: {px:?}");
        assert!((px.w - 0.75).abs() < 1e-5);
    }

    #[test]
    fn test_uncovered_pixels_are_discarded() {
        let mut pipeline = ReferencePipeline::new(OitSettings::default(), 64, 64).unwrap();
        let image = pipeline.render_frame(&sheet(10, 10, Vec3::ONE, 0.5, 0.5));
        assert_eq!(image.covered_pixels(), 100);
        assert_eq!(image.get(10, 0), None);

        let mut background = vec![Vec4::new(0.0, 0.0, 0.0, 1.0); 64 * 64];
        image.composite_over(&mut background).unwrap();
        assert_eq!(background[64 * 63], Vec4::new(0.0, 0.0, 0.0, 1.0));
        assert!((background[0] - Vec4::new(0.5, 0.5, 0.5, 1.0)).abs().max_element() < 1e-6);
    }

    #[test]
    fn test_premultiplied_input_matches_straight() {
        let color = Vec3::new(0.8, 0.4, 0.2);
        let alpha = 0.5;
        let straight = sheet(8, 8, color, alpha, 0.4);
        let premultiplied = sheet(8, 8, color * alpha, alpha, 0.4);

        let mut a = ReferencePipeline::new(OitSettings::default(), 8, 8).unwrap();
        let mut b = ReferencePipeline::new(
            OitSettings {
                alpha_mode: AlphaMode::Premultiplied,
                ..Default::default()
            },
            8,
            8,
        )
        .unwrap();
        for _ in 0..2 {
            let ia = a.render_frame(&straight);
            let ib = b.render_frame(&premultiplied);
            assert!(max_difference(&ia, &ib) < 1e-6);
        }
    }

    #[test]
    fn test_fixed_exponential_has_no_frame_latency() {
        let settings = OitSettings {
            weight_strategy: WeightStrategy::FixedExponential { falloff: 8.0 },
            ..Default::default()
        };
        let mut fragments = sheet(16, 16, Vec3::new(1.0, 0.0, 0.0), 0.5, 0.1);
        fragments.extend(sheet(16, 16, Vec3::new(0.0, 0.0, 1.0), 0.5, 0.9));
        let mut pipeline = ReferencePipeline::new(settings, 16, 16).unwrap();

        let first = pipeline.render_frame(&fragments);
        let second = pipeline.render_frame(&fragments);
        assert!(max_difference(&first, &second) < 1e-6);
        let px = first.get(0, 0).unwrap();
        assert!(px.x > px.z);
        assert!(pipeline.histogram().is_clear());
    }
}
