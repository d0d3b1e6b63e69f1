//! Turns the machine's one-byte-per-pixel video memory into RGBA.

use crate::machine::{PixelState, HEIGHT, WIDTH};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// bytes per pixel in a framebuffer
pub const RGBA: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("'{0}' is not a colour, expected six hex digits like 33ff66")]
pub struct ParseColourError(String);

impl FromStr for Rgb {
    type Err = ParseColourError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let err = || ParseColourError(s.to_string());
        if hex.len() != 6 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(err());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        Ok(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// the two colours a monochrome display is drawn with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Palette {
    pub on: Rgb,
    pub off: Rgb,
}

impl Palette {
    /// phosphor green on black
    pub const GREEN: Palette = Palette {
        on: Rgb(0x33, 0xff, 0x66),
        off: Rgb(0, 0, 0),
    };

    /// amber on a dark blue-grey
    pub const AMBER: Palette = Palette {
        on: Rgb(255, 95, 0),
        off: Rgb(16, 15, 22),
    };

    pub fn new(on: Rgb, off: Rgb) -> Self {
        Palette { on, off }
    }

    fn rgba(&self, lit: bool) -> [u8; RGBA] {
        let Rgb(r, g, b) = if lit { self.on } else { self.off };
        [r, g, b, 0xff]
    }
}

impl Default for Palette {
    fn default() -> Self {
        Palette::GREEN
    }
}

/// RGBA, row-major, origin at the top left
#[derive(Clone, PartialEq, Eq)]
pub struct Framebuffer {
    bytes: Vec<u8>,
}

impl Framebuffer {
    /// an all-black, fully opaque frame
    pub fn new() -> Self {
        let mut bytes = vec![0u8; RGBA * WIDTH * HEIGHT];
        for px in bytes.chunks_exact_mut(RGBA) {
            px[3] = 0xff;
        }
        Framebuffer { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn width(&self) -> usize {
        WIDTH
    }

    pub fn height(&self) -> usize {
        HEIGHT
    }

    /// RGBA of the pixel at (x, y)
    pub fn pixel(&self, x: usize, y: usize) -> [u8; RGBA] {
        let at = RGBA * (x + y * WIDTH);
        let mut px = [0u8; RGBA];
        px.copy_from_slice(&self.bytes[at..at + RGBA]);
        px
    }

    /// (x, y) of every pixel drawn in the given colour
    pub fn coords_of(&self, colour: Rgb) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.bytes
            .chunks_exact(RGBA)
            .enumerate()
            .filter(move |(_, px)| Rgb(px[0], px[1], px[2]) == colour)
            .map(|(i, _)| (i % WIDTH, i / WIDTH))
    }
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Framebuffer({}x{} RGBA)", WIDTH, HEIGHT)
    }
}

/// decode video memory into a fresh framebuffer; any nonzero pixel is lit
pub fn decode(pixels: &PixelState, palette: &Palette) -> Framebuffer {
    let mut frame = Framebuffer::new();
    decode_into(pixels, palette, &mut frame);
    frame
}

/// as `decode`, reusing an existing framebuffer
pub fn decode_into(pixels: &PixelState, palette: &Palette, frame: &mut Framebuffer) {
    let (on, off) = (palette.rgba(true), palette.rgba(false));
    for (px, state) in frame.bytes.chunks_exact_mut(RGBA).zip(pixels.iter()) {
        px.copy_from_slice(if *state != 0 { &on } else { &off });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_colour() {
        assert_eq!("33ff66".parse(), Ok(Rgb(0x33, 0xff, 0x66)));
        assert_eq!("#100F16".parse(), Ok(Rgb(16, 15, 22)));
        assert!("33ff6".parse::<Rgb>().is_err());
        assert!("33gf66".parse::<Rgb>().is_err());
        assert!("ééé".parse::<Rgb>().is_err());
        // from_str_radix alone would take the signs
        assert!("+f+f+f".parse::<Rgb>().is_err());
        assert!("#+0+0+0".parse::<Rgb>().is_err());
    }

    #[test]
    fn test_colour_displays_as_hex() {
        assert_eq!(Rgb(255, 95, 0).to_string(), "ff5f00");
    }

    #[test]
    fn test_blank_screen() {
        let frame = decode(&[0; WIDTH * HEIGHT], &Palette::AMBER);
        assert_eq!(frame.as_bytes().len(), 8192);
        assert_eq!(frame.pixel(0, 0), [16, 15, 22, 255]);
        assert_eq!(frame.pixel(63, 31), [16, 15, 22, 255]);
    }

    #[test]
    fn test_single_pixel_offset() {
        let mut pixels = [0; WIDTH * HEIGHT];
        pixels[5 + 3 * WIDTH] = 1;
        let frame = decode(&pixels, &Palette::GREEN);
        let at = RGBA * (5 + 3 * WIDTH);
        assert_eq!(&frame.as_bytes()[at..at + 4], &[0x33, 0xff, 0x66, 0xff]);
        assert_eq!(frame.coords_of(Palette::GREEN.on).collect::<Vec<_>>(), vec![(5, 3)]);
        assert_eq!(frame.coords_of(Palette::GREEN.off).count(), WIDTH * HEIGHT - 1);
    }

    #[test]
    fn test_nonzero_counts_as_lit() {
        let mut pixels = [0; WIDTH * HEIGHT];
        pixels[0] = 7;
        let frame = decode(&pixels, &Palette::GREEN);
        assert_eq!(frame.pixel(0, 0), [0x33, 0xff, 0x66, 0xff]);
    }

    #[test]
    fn test_decode_into_overwrites_previous_frame() {
        let mut frame = decode(&[1; WIDTH * HEIGHT], &Palette::GREEN);
        decode_into(&[0; WIDTH * HEIGHT], &Palette::GREEN, &mut frame);
        assert_eq!(frame, decode(&[0; WIDTH * HEIGHT], &Palette::GREEN));
    }

    fn pixel_state() -> impl Strategy<Value = Vec<u8>> {
        prop::collection::vec(0u8..=1, WIDTH * HEIGHT)
    }

    proptest! {
        #[test]
        fn prop_decode_matches_palette(
            state in pixel_state(),
            on in any::<(u8, u8, u8)>(),
            off in any::<(u8, u8, u8)>(),
        ) {
            let mut pixels = [0u8; WIDTH * HEIGHT];
            pixels.copy_from_slice(&state);
            let palette = Palette::new(Rgb(on.0, on.1, on.2), Rgb(off.0, off.1, off.2));
            let frame = decode(&pixels, &palette);
            let bytes = frame.as_bytes();

            prop_assert_eq!(bytes.len(), 4 * WIDTH * HEIGHT);
            for (i, px) in bytes.chunks_exact(4).enumerate() {
                prop_assert_eq!(px[3], 255);
                let expect = if pixels[i] == 1 { on } else { off };
                prop_assert_eq!((px[0], px[1], px[2]), expect);
            }
        }
    }
}
