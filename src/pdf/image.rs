use pdf_writer::{Filter, Pdf, Ref};

/// Raw image assets keyed by the name cells use to reference them.
pub type Assets = std::collections::HashMap<String, Vec<u8>>;

#[derive(Debug)]
enum Pixels {
    /// Baseline JPEG passed through with DCTDecode.
    Jpeg { data: Vec<u8>, gray: bool },
    Rgb { rgb: Vec<u8>, alpha: Option<Vec<u8>> },
}

/// A decoded asset, ready to be written as an image XObject.
#[derive(Debug)]
pub struct PreparedImage {
    pub pixel_width: u32,
    pub pixel_height: u32,
    pixels: Pixels,
}

impl PreparedImage {
    pub fn decode(data: &[u8]) -> Result<Self, image::ImageError> {
        let format = image::guess_format(data)?;
        let decoded = image::load_from_memory_with_format(data, format)?;
        let (w, h) = (decoded.width(), decoded.height());

        let jpeg_gray = match decoded.color() {
            image::ColorType::L8 => Some(true),
            image::ColorType::Rgb8 => Some(false),
            _ => None,
        };
        if format == image::ImageFormat::Jpeg
            && let Some(gray) = jpeg_gray
        {
            return Ok(Self {
                pixel_width: w,
                pixel_height: h,
                pixels: Pixels::Jpeg {
                    data: data.to_vec(),
                    gray,
                },
            });
        }

        let rgba = decoded.to_rgba8();
        let has_alpha = rgba.pixels().any(|p| p.0[3] < 255);
        let rgb: Vec<u8> = rgba
            .pixels()
            .flat_map(|p| [p.0[0], p.0[1], p.0[2]])
            .collect();
        let alpha = has_alpha.then(|| rgba.pixels().map(|p| p.0[3]).collect());
        Ok(Self {
            pixel_width: w,
            pixel_height: h,
            pixels: Pixels::Rgb { rgb, alpha },
        })
    }

    /// Largest size with the image's aspect ratio that fits the box.
    pub fn fit(&self, box_width: f32, box_height: f32) -> (f32, f32) {
        fit_size(self.pixel_width, self.pixel_height, box_width, box_height)
    }
}

pub(crate) fn fit_size(pixel_width: u32, pixel_height: u32, box_width: f32, box_height: f32) -> (f32, f32) {
    if pixel_width == 0 || pixel_height == 0 || box_width <= 0.0 || box_height <= 0.0 {
        return (0.0, 0.0);
    }
    let (pw, ph) = (pixel_width as f32, pixel_height as f32);
    let scale = (box_width / pw).min(box_height / ph);
    (pw * scale, ph * scale)
}

pub(crate) fn embed_image(pdf: &mut Pdf, img: &PreparedImage, alloc: &mut impl FnMut() -> Ref) -> Ref {
    let xobj_ref = alloc();
    let (w, h) = (img.pixel_width as i32, img.pixel_height as i32);
    match &img.pixels {
        Pixels::Jpeg { data, gray } => {
            let mut xobj = pdf.image_xobject(xobj_ref, data);
            xobj.filter(Filter::DctDecode);
            xobj.width(w);
            xobj.height(h);
            if *gray {
                xobj.color_space().device_gray();
            } else {
                xobj.color_space().device_rgb();
            }
            xobj.bits_per_component(8);
        }
        Pixels::Rgb { rgb, alpha } => {
            let smask_ref = alpha.as_ref().map(|alpha| {
                let compressed_alpha = miniz_oxide::deflate::compress_to_vec_zlib(alpha, 6);
                let mask_ref = alloc();
                let mut mask = pdf.image_xobject(mask_ref, &compressed_alpha);
                mask.filter(Filter::FlateDecode);
                mask.width(w);
                mask.height(h);
                mask.color_space().device_gray();
                mask.bits_per_component(8);
                mask_ref
            });

            let compressed_rgb = miniz_oxide::deflate::compress_to_vec_zlib(rgb, 6);
            let mut xobj = pdf.image_xobject(xobj_ref, &compressed_rgb);
            xobj.filter(Filter::FlateDecode);
            xobj.width(w);
            xobj.height(h);
            xobj.color_space().device_rgb();
            xobj.bits_per_component(8);
            if let Some(mask_ref) = smask_ref {
                xobj.s_mask(mask_ref);
            }
        }
    }
    xobj_ref
}
