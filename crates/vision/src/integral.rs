use image::GrayImage;

/// Summed-area tables of pixel values and squared pixel values.
///
/// Both tables are `(width + 1) x (height + 1)` with a zero first row and
/// column, so any rectangle sum takes four lookups.
#[derive(Debug, Clone)]
pub struct IntegralImage {
    width: u32,
    height: u32,
    sum: Vec<f64>,
    sq_sum: Vec<f64>,
}

impl IntegralImage {
    pub fn new(image: &GrayImage) -> Self {
        let (width, height) = image.dimensions();
        let stride = width as usize + 1;
        let mut sum = vec![0.0; stride * (height as usize + 1)];
        let mut sq_sum = vec![0.0; stride * (height as usize + 1)];
        for y in 0..height as usize {
            let mut row = 0.0;
            let mut row_sq = 0.0;
            for x in 0..width as usize {
                let value = image.get_pixel(x as u32, y as u32).0[0] as f64;
                row += value;
                row_sq += value * value;
                let at = (y + 1) * stride + x + 1;
                sum[at] = sum[at - stride] + row;
                sq_sum[at] = sq_sum[at - stride] + row_sq;
            }
        }
        Self {
            width,
            height,
            sum,
            sq_sum,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn lookup(table: &[f64], stride: usize, x: u32, y: u32, w: u32, h: u32) -> f64 {
        let (x0, y0) = (x as usize, y as usize);
        let (x1, y1) = (x0 + w as usize, y0 + h as usize);
        table[y1 * stride + x1] - table[y0 * stride + x1] - table[y1 * stride + x0]
            + table[y0 * stride + x0]
    }

    /// Sum of pixels in the rectangle. The rectangle must lie inside the image.
    pub fn rect_sum(&self, x: u32, y: u32, w: u32, h: u32) -> f64 {
        debug_assert!(x + w <= self.width && y + h <= self.height);
        Self::lookup(&self.sum, self.width as usize + 1, x, y, w, h)
    }

    pub fn rect_sq_sum(&self, x: u32, y: u32, w: u32, h: u32) -> f64 {
        debug_assert!(x + w <= self.width && y + h <= self.height);
        Self::lookup(&self.sq_sum, self.width as usize + 1, x, y, w, h)
    }
}
