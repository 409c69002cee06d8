use std::cmp::Ordering;
use std::fmt;
use std::fmt::Formatter;

/// a polynomial represented by its monomial coefficients
#[derive(Debug, Clone, PartialEq)]
pub struct Polynomial {
    coeffs: Vec<f64>,
}

impl Polynomial {
    /// Returns an initialized polynomial
    ///
    /// # Arguments
    ///
    /// `coeffs` - coefficients where index corresponds to power
    ///
    /// # Examples
    ///
    /// ```
    /// use corridor_trajgen::Polynomial;
    /// // f(t) = 7 - 2t + 3t^2
    /// let poly = Polynomial::new(&[7.0, -2.0, 3.0]);
    /// ```
    pub fn new(coeffs: &[f64]) -> Polynomial {
        if coeffs.is_empty() {
            panic!("Cannot initialize Polynomial with empty coefficients!");
        }
        Polynomial { coeffs: coeffs.to_vec() }
    }

    /// The coefficients, lowest power first
    pub fn coeffs(&self) -> &[f64] {
        &self.coeffs
    }

    /// Number of coefficients, i.e. degree + 1
    pub fn order(&self) -> usize {
        self.coeffs.len()
    }

    /// Returns the solution to f(t) at a given t
    ///
    /// # Examples
    ///
    /// ```
    /// use corridor_trajgen::Polynomial;
    /// let poly = Polynomial::new(&[7.0, -2.0, 3.0]);
    /// assert_eq!(8.0, poly.eval(1.0));
    /// ```
    pub fn eval(&self, t: f64) -> f64 {
        // Horner's scheme, highest power first
        self.coeffs.iter().rev().fold(0.0, |acc, c| acc * t + c)
    }

    /// Returns the derivative of the polynomial
    ///
    /// # Examples
    ///
    /// ```
    /// use corridor_trajgen::Polynomial;
    /// // f(t) = 7 - 2t + 3t^2
    /// let poly = Polynomial::new(&[7.0, -2.0, 3.0]);
    /// // f'(t) = -2 + 6t
    /// let der = poly.derivative();
    /// ```
    pub fn derivative(&self) -> Polynomial {
        // special case when we are down to a single coefficient
        if self.coeffs.len() == 1 {
            return Polynomial::new(&[0.]);
        }

        // drop coefficient at index 0, and multiply coefficients by power
        let newcoeffs: Vec<f64> = self.coeffs.iter()
            .enumerate()
            .skip(1)
            .map(|(power, c)| c * power as f64)
            .collect();

        Polynomial::new(&newcoeffs)
    }

    /// Returns the `order`-th derivative, 0 being the polynomial itself
    pub fn nth_derivative(&self, order: usize) -> Polynomial {
        (0..order).fold(self.clone(), |poly, _| poly.derivative())
    }
}

impl fmt::Display for Polynomial {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut s = String::from("f(t) = ");
        for (idx, c) in self.coeffs.iter().enumerate() {
            let coeff: String = match c.partial_cmp(&0.0) {
                Some(Ordering::Less) => format!("- {}", -c),
                Some(Ordering::Greater) => format!("+ {}", c),
                Some(Ordering::Equal) => String::new(),
                None => String::from("+ NaN"),
            };

            // zero coefficients are skipped entirely
            if coeff.is_empty() {
                continue;
            }

            s.push_str(&coeff);

            // append on the t and its power
            if idx > 0 {
                let x = if idx > 1 { format!("t^{} ", idx) } else { String::from("t ") };
                s.push_str(&x);
            } else {
                s.push(' ');
            }
        }
        write!(f, "{}", s.trim())
    }
}
