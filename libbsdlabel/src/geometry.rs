#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub heads: u32,
    pub sectors: u32,
    pub cylinders: u32,
}

impl Geometry {
    /* No HDIO-style autodetection here; fake the modern fdisk default
     * translation and let callers override. */
    pub fn guess(size_bytes: u64, sector_size: u64) -> Geometry {
        let heads = 255u32;
        let sectors = 63u32;
        let cylinder_bytes = u64::from(heads) * u64::from(sectors) * sector_size;
        let cylinders = (size_bytes / cylinder_bytes).max(1).min(u64::from(u32::MAX)) as u32;

        Geometry {
            heads,
            sectors,
            cylinders,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    #[default]
    Sectors,
    Cylinders,
}

impl Unit {
    pub fn noun(&self) -> &'static str {
        match self {
            Unit::Sectors => "sector",
            Unit::Cylinders => "cylinder",
        }
    }
}

/*
 * Cylinder entries round asymmetrically at the two ends of a partition:
 * cylinder c starts at sector (c-1)*secpercyl and ends at c*secpercyl - 1.
 * Displaying goes the other way through cround(), with a partial-cylinder
 * marker when the sector does not sit on a boundary.
 */

pub fn first_sector_of_cylinder(c: u64, secpercyl: u64) -> u64 {
    (c - 1) * secpercyl
}

pub fn last_sector_of_cylinder(c: u64, secpercyl: u64) -> u64 {
    c * secpercyl - 1
}

pub fn cround(sector: u64, secpercyl: u64) -> u64 {
    sector / secpercyl + 1
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CylValue {
    pub value: u64,
    pub partial: bool,
}

impl CylValue {
    pub fn render(&self) -> String {
        if self.partial {
            format!("{}*", self.value)
        } else {
            self.value.to_string()
        }
    }
}

pub fn cyl_start(offset: u64, secpercyl: u64) -> CylValue {
    CylValue {
        value: offset / secpercyl + 1,
        partial: offset % secpercyl != 0,
    }
}

pub fn cyl_end(offset: u64, size: u64, secpercyl: u64) -> CylValue {
    CylValue {
        value: (offset + size).div_ceil(secpercyl),
        partial: (offset + size) % secpercyl != 0,
    }
}

pub fn cyl_size(size: u64, secpercyl: u64) -> CylValue {
    CylValue {
        value: size / secpercyl,
        partial: size % secpercyl != 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_rounding_is_asymmetric() {
        // entering cylinders 2..5 with 1008 sectors per cylinder
        assert_eq!(first_sector_of_cylinder(2, 1008), 1008);
        assert_eq!(last_sector_of_cylinder(5, 1008), 5039);

        assert_eq!(first_sector_of_cylinder(1, 1008), 0);
        assert_eq!(last_sector_of_cylinder(1, 1008), 1007);
    }

    #[test]
    fn cround_inverts_first_sector() {
        for c in 1..64 {
            assert_eq!(cround(first_sector_of_cylinder(c, 1008), 1008), c);
        }
    }

    #[test]
    fn display_values_mark_partial_cylinders() {
        assert_eq!(
            cyl_start(1008, 1008),
            CylValue {
                value: 2,
                partial: false
            }
        );
        assert_eq!(
            cyl_start(1500, 1008),
            CylValue {
                value: 2,
                partial: true
            }
        );
        assert_eq!(
            cyl_end(1008, 4032, 1008),
            CylValue {
                value: 5,
                partial: false
            }
        );
        assert_eq!(
            cyl_end(0, 1000, 1008),
            CylValue {
                value: 1,
                partial: true
            }
        );
        assert_eq!(cyl_size(4032, 1008).render(), "4");
        assert_eq!(cyl_size(4000, 1008).render(), "3*");
    }

    #[test]
    fn guessed_geometry_never_yields_zero_cylinders() {
        let g = Geometry::guess(512, 512);
        assert_eq!(g.cylinders, 1);

        let g = Geometry::guess(80 * 1024 * 1024 * 1024, 512);
        assert_eq!(g.heads, 255);
        assert_eq!(g.sectors, 63);
        assert!(g.cylinders > 10_000);
    }
}
