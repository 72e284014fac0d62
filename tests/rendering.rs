use image::Rgba;

use perlerpad::canvas::Grid;
use perlerpad::palette::FROSTED;
use perlerpad::render::{GridRenderer, RenderConfig, Theme};

const WHITE: Rgba<u8> = Rgba([0xFF, 0xFF, 0xFF, 0xFF]);
const GREY: Rgba<u8> = Rgba([0xE0, 0xE0, 0xE0, 0xFF]);

fn frosted_grid() -> Grid {
    Grid::from_colors(2, 2, vec![Some(FROSTED), None, None, None])
}

#[test]
fn frosted_cells_use_the_checkerboard_in_every_theme() {
    for theme in [Theme::Light, Theme::Dark] {
        let mut config = RenderConfig::new(2, 2, 20.0);
        config.theme = theme;
        let mut renderer = match GridRenderer::configure(config) {
            Ok(r) => r,
            Err(e) => panic!("renderer: {}", e),
        };
        renderer.render_full(&frosted_grid());

        let surface = renderer.surface();
        assert_eq!(surface.pixel_at(2.0, 2.0), Some(WHITE), "{theme}");
        assert_eq!(surface.pixel_at(6.0, 2.0), Some(GREY), "{theme}");
        assert_eq!(surface.pixel_at(6.0, 6.0), Some(WHITE), "{theme}");
        assert_eq!(surface.pixel_at(10.0, 6.0), Some(GREY), "{theme}");
    }
}

#[test]
fn exported_png_has_the_surface_size() {
    let mut config = RenderConfig::new(3, 2, 20.0);
    config.device_pixel_ratio = 2.0;
    let mut renderer = match GridRenderer::configure(config) {
        Ok(r) => r,
        Err(e) => panic!("renderer: {}", e),
    };
    renderer.render_full(&Grid::new(3, 2));

    let path = std::env::temp_dir().join(format!("perlerpad_export_{}.png", std::process::id()));
    perlerpad::io::export_image(&renderer.into_image(), &path).unwrap();
    let decoded = image::open(&path).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (120, 80));
    let _ = std::fs::remove_file(&path);
}
