use rtm_core::color::Rgb565;
use rtm_core::config::MediaConfig;
use rtm_core::render::{Deployment, Font, Margins, Overlay, RenderSettings, Renderer, Source, TextGrid, BORDER};

const fn glyphs() -> [u8; 96 * 8] {
    let mut g = [0u8; 96 * 8];
    let mut i = 0;
    while i < g.len() {
        g[i] = ((i * 37) as u8) ^ ((i >> 3) as u8);
        i += 1;
    }
    g
}

const GLYPHS: [u8; 96 * 8] = glyphs();
const FONT: Font = Font { glyphs: &GLYPHS, height: 8, first: 0x20, count: 96 };
const BLANK_FONT: Font = Font { glyphs: &[], height: 8, first: 0, count: 0 };

fn solid_overlay(x: u16, y: u16, w: u16, h: u16, color: u16, moving: bool) -> Overlay {
    Overlay { x, y, width: w, height: h, pixels: vec![color; w as usize * h as usize].into(), moving }
}

#[test]
fn scanlines_halve_odd_lines_only() {
    let config = MediaConfig { settings: RenderSettings::new(false, true, Margins::default()), ..MediaConfig::default() };
    let mut r = Renderer::new(&config, BLANK_FONT);

    let color = Rgb565::from_rgb888(200, 100, 50);
    let frame = vec![color.raw(); 320 * 240];
    let mut out = vec![0u16; 640];

    for line in 0..480u16 {
        r.render_line(line, Source::Frame(&frame), &mut out);
        for px in out.iter().map(|p| Rgb565::from_raw(*p)) {
            if line % 2 == 1 {
                assert_eq!(px.red(), color.red() / 2);
                assert_eq!(px.green(), color.green() / 2);
                assert_eq!(px.blue(), color.blue() / 2);
            } else {
                assert_eq!(px, color);
            }
        }
    }

    r.set_scanlines(false);
    for line in 0..480u16 {
        r.render_line(line, Source::Frame(&frame), &mut out);
        assert!(out.iter().all(|p| *p == color.raw()), "line {line}");
    }
}

/// A 32x8 source shown 20x enlarged, so source pixel `x` is output pixel
/// `x * 20` of output line 160.
mod ordering {
    use super::*;

    const LINE: u16 = 160;

    fn renderer() -> Renderer {
        let config = MediaConfig { source_width: 32, source_height: 8, text_cols: 2, text_rows: 1, ..MediaConfig::default() };
        Renderer::new(&config, BLANK_FONT)
    }

    fn grid() -> TextGrid {
        let mut grid = TextGrid::new(2, 1);
        grid.clear(15, 1);
        grid
    }

    fn source_row(r: &mut Renderer, grid: &TextGrid) -> [u16; 32] {
        let mut out = vec![0u16; 640];
        r.render_line(LINE, Source::Text(grid), &mut out);
        core::array::from_fn(|x| out[x * 20])
    }

    #[test]
    fn overlay_then_text_around_it() {
        let mut r = renderer();
        let grid = grid();
        let blue = grid.palette.get(1);
        let (red, green, white) = (0xF800, 0x07E0, 0xFFFF);

        assert_eq!(r.y_map(LINE as usize), 0);

        // static box outside the text area
        assert!(r.set_overlay(Some(solid_overlay(24, 0, 4, 1, red, false))).is_none());
        let row = source_row(&mut r, &grid);
        assert_eq!(&row[..16], &[blue; 16]);
        assert_eq!(&row[24..28], &[red; 4]);

        // static box at the origin: the old box is gone, outside the text is black
        assert!(r.set_overlay(Some(solid_overlay(0, 0, 4, 1, white, false))).is_some());
        let row = source_row(&mut r, &grid);
        assert_eq!(&row[..4], &[white; 4]);
        assert_eq!(&row[4..16], &[blue; 12]);
        assert_eq!(&row[16..], &[0; 16]);

        // moving box: the line is cleared first, text goes around the box
        assert!(r.set_overlay(Some(solid_overlay(8, 0, 4, 1, green, true))).is_some());
        let row = source_row(&mut r, &grid);
        assert_eq!(&row[..8], &[blue; 8]);
        assert_eq!(&row[8..12], &[green; 4]);
        assert_eq!(&row[12..16], &[blue; 4]);
        assert_eq!(&row[16..], &[0; 16]);
    }

    #[test]
    fn oversized_overlay_leaves_the_text_alone() {
        let mut r = renderer();
        let grid = grid();
        let blue = grid.palette.get(1);

        let rejected = solid_overlay(0, 0, 64, 1, 0xF800, true);
        assert!(r.set_overlay(Some(rejected)).is_some());
        assert_eq!(r.overlay_rejections(), 1);

        let row = source_row(&mut r, &grid);
        assert_eq!(&row[..16], &[blue; 16]);
    }
}

fn render_frame(deployment: Deployment, grid: &TextGrid, moves: &[(u16, u16)]) -> Vec<Vec<u16>> {
    let config = MediaConfig {
        deployment,
        settings: RenderSettings::new(true, true, Margins { left: 0, top: 0 }),
        ..MediaConfig::default()
    };
    let mut r = Renderer::new(&config, FONT);
    let art: Vec<u16> = (0..64 * 48).map(|i| (i * 7919) as u16).collect();
    r.set_overlay(Some(Overlay { x: 100, y: 50, width: 64, height: 48, pixels: art.into(), moving: false }));

    let mut frames = Vec::new();
    let mut out = vec![0u16; 640];
    for &(x, y) in moves {
        r.move_overlay(x, y);
        r.prepare(&Source::Text(grid));
        for line in 0..480u16 {
            r.render_line(line, Source::Text(grid), &mut out);
            frames.push(out.clone());
        }
    }
    frames
}

#[test]
fn deployments_render_the_same_lines() {
    let mut grid = TextGrid::new(40, 30);
    for row in 0..30u16 {
        grid.print(0, row, "The quick brown fox jumps over the lazy", (row % 16) as u8, ((row + 3) % 16) as u8);
    }
    grid.selected = Some(5);

    let moves = [(100, 50), (120, 60), (0, 0)];
    let streaming = render_frame(Deployment::Streaming, &grid, &moves);
    let framebuffer = render_frame(Deployment::Framebuffer, &grid, &moves);
    assert_eq!(streaming.len(), framebuffer.len());
    for (i, (a, b)) in streaming.iter().zip(&framebuffer).enumerate() {
        assert_eq!(a, b, "frame {} line {}", i / 480, i % 480);
    }
}

#[test]
fn short_narrow_grid_renders_the_same_lines() {
    // 36x20 cells cover 288x160 of the 320x240 source
    let mut grid = TextGrid::new(36, 20);
    grid.clear(15, 4);
    grid.print(1, 1, "short and narrow", 14, 4);
    let bg = grid.palette.get(4);

    let moves = [(100, 50), (0, 0), (200, 180)];
    let streaming = render_frame(Deployment::Streaming, &grid, &moves);
    let framebuffer = render_frame(Deployment::Framebuffer, &grid, &moves);
    for (i, (a, b)) in streaming.iter().zip(&framebuffer).enumerate() {
        assert_eq!(a, b, "frame {} line {}", i / 480, i % 480);
    }

    assert!(streaming[2].contains(&bg));
    assert_eq!(streaming[2].last(), Some(&0));
    assert!(streaming[479].iter().all(|p| *p == 0));
    assert!(framebuffer[479].iter().all(|p| *p == 0));
}

#[test]
fn aspect_margins_are_black() {
    let config = MediaConfig {
        source_width: 256,
        source_height: 224,
        text_cols: 32,
        settings: RenderSettings::new(true, false, Margins { left: 27, top: 16 }),
        ..MediaConfig::default()
    };
    let mut r = Renderer::new(&config, BLANK_FONT);
    let frame = vec![0xFFFFu16; 256 * 224];
    let mut out = vec![0x1234u16; 640];

    r.render_line(0, Source::Frame(&frame), &mut out);
    assert!(out.iter().all(|p| *p == 0));

    r.render_line(16, Source::Frame(&frame), &mut out);
    for (x, px) in out.iter().enumerate() {
        let inside = r.x_map(x) != BORDER;
        assert_eq!(*px, if inside { 0xFFFF } else { 0 }, "x {x}");
    }
    assert_eq!(out[26], 0);
    assert_eq!(out[27], 0xFFFF);
    assert_eq!(out[611], 0xFFFF);
    assert_eq!(out[612], 0);
}
